//! Модели данных конвейера
//!
//! Каждая сущность создаётся одной стадией и передаётся следующей по значению.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::errors::ChunkId;

/// Размер кадра в пикселях
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Новость: порядковый номер (с 1) и текст
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: u32,
    pub text: String,
}

impl NewsItem {
    /// Нумерует тексты по порядку, начиная с 1
    pub fn from_texts<I, S>(texts: I) -> Vec<NewsItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, id)| NewsItem { id, text: text.into() })
            .collect()
    }

    /// Разбор списка новостей: JSON-массив строк или одна новость на строку
    pub fn parse_list(raw: &str) -> Vec<NewsItem> {
        if let Ok(texts) = serde_json::from_str::<Vec<String>>(raw) {
            return Self::from_texts(texts.into_iter().filter(|t| !t.trim().is_empty()));
        }
        Self::from_texts(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        )
    }
}

/// Исходное изображение новости
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub news_id: u32,
    /// Порядковый номер внутри новости (с 1)
    pub index: u32,
}

/// Фрагмент текста, который показывается и озвучивается вместе с одним изображением
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub news_id: u32,
    /// Порядковый номер внутри новости (с 1)
    pub index: u32,
    pub content: String,
}

impl TextChunk {
    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.news_id, self.index)
    }
}

/// Озвучка одного фрагмента. Временный файл
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub path: PathBuf,
    /// Длительность в секундах
    pub duration_secs: f64,
    /// Частота дискретизации
    pub sample_rate: u32,
}

/// Минимальная единица таймлайна: кадр с текстом, длительность и звук
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub id: ChunkId,
    pub frame_path: PathBuf,
    /// Длительность в секундах, равна длительности озвучки
    pub duration_secs: f64,
    pub audio: Option<AudioClip>,
    /// Длительность перехода от предыдущего сегмента
    pub transition_in: Option<f64>,
}

/// Результат экспорта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportOutcome {
    Exported {
        path: PathBuf,
        segments: usize,
        duration_secs: f64,
    },
    NothingToExport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_items_are_numbered_from_one() {
        let items = NewsItem::from_texts(["first", "second"]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].id, 2);
        assert_eq!(items[1].text, "second");
    }

    #[test]
    fn test_parse_list_accepts_json_and_lines() {
        let items = NewsItem::parse_list(r#"["one", "  ", "two"]"#);
        assert_eq!(items, NewsItem::from_texts(["one", "two"]));

        let items = NewsItem::parse_list("first news\n\n  second news  \n");
        assert_eq!(items, NewsItem::from_texts(["first news", "second news"]));
    }

    #[test]
    fn test_chunk_id_from_chunk() {
        let chunk = TextChunk {
            news_id: 5,
            index: 2,
            content: "text".to_string(),
        };
        assert_eq!(chunk.id(), ChunkId::new(5, 2));
    }
}
