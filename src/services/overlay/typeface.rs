//! Источник глифов для наложения текста
//!
//! Рендерер работает с трейтом `Typeface`, реальная реализация на fontdue.

use fontdue::{Font, FontSettings};
use std::path::Path;

use crate::errors::{AppError, AppResult};

/// Вертикальные метрики шрифта для заданного кегля
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    /// Расстояние от базовой линии до верха, положительное
    pub ascent: f32,
    /// Расстояние от базовой линии до низа, отрицательное
    pub descent: f32,
    pub line_gap: f32,
}

impl VerticalMetrics {
    pub fn line_height(&self) -> u32 {
        (self.ascent - self.descent + self.line_gap).ceil().max(1.0) as u32
    }
}

/// Растеризованный глиф
#[derive(Debug, Clone, Default)]
pub struct Glyph {
    pub width: usize,
    pub height: usize,
    /// Смещение левого края битмапа от пера
    pub xmin: i32,
    /// Смещение нижнего края битмапа от базовой линии, вверх положительное
    pub ymin: i32,
    pub advance: f32,
    /// Покрытие 0..=255, построчно
    pub coverage: Vec<u8>,
}

pub trait Typeface: Send + Sync {
    fn vertical_metrics(&self, px: f32) -> VerticalMetrics;
    fn advance(&self, ch: char, px: f32) -> f32;
    fn rasterize(&self, ch: char, px: f32) -> Glyph;

    /// Ширина строки в пикселях по ширинам продвижения
    fn text_width(&self, text: &str, px: f32) -> f32 {
        text.chars().map(|c| self.advance(c, px)).sum()
    }
}

pub struct FontdueTypeface {
    font: Font,
}

impl FontdueTypeface {
    pub fn from_bytes(bytes: Vec<u8>) -> AppResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| AppError::ConfigurationError(format!("Failed to parse font: {}", e)))?;
        Ok(Self { font })
    }

    /// Шрифт не загрузился: прогон без текста не имеет смысла, ошибка конфигурации
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::ConfigurationError(format!("Cannot read font {}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes)
    }
}

impl Typeface for FontdueTypeface {
    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        match self.font.horizontal_line_metrics(px) {
            Some(m) => VerticalMetrics {
                ascent: m.ascent,
                descent: m.descent,
                line_gap: m.line_gap,
            },
            None => VerticalMetrics {
                ascent: px * 0.8,
                descent: -px * 0.2,
                line_gap: 0.0,
            },
        }
    }

    fn advance(&self, ch: char, px: f32) -> f32 {
        self.font.metrics(ch, px).advance_width
    }

    fn rasterize(&self, ch: char, px: f32) -> Glyph {
        let (metrics, coverage) = self.font.rasterize(ch, px);
        Glyph {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        }
    }
}

/// Моноширинный шрифт из сплошных прямоугольников, для тестов без файла шрифта
#[cfg(test)]
pub(crate) struct BlockTypeface;

#[cfg(test)]
impl Typeface for BlockTypeface {
    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: px * 0.8,
            descent: -px * 0.2,
            line_gap: 0.0,
        }
    }

    fn advance(&self, _ch: char, px: f32) -> f32 {
        (px * 0.5).round()
    }

    fn rasterize(&self, ch: char, px: f32) -> Glyph {
        let advance = self.advance(ch, px);
        if ch.is_whitespace() {
            return Glyph {
                advance,
                ..Glyph::default()
            };
        }
        let width = (advance as usize).saturating_sub(2).max(1);
        let height = (px * 0.7).round() as usize;
        Glyph {
            width,
            height,
            xmin: 1,
            ymin: 0,
            advance,
            coverage: vec![255; width * height],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_is_configuration_error() {
        let err = FontdueTypeface::from_file(Path::new("/nonexistent/font.ttf"))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }

    #[test]
    fn test_invalid_font_bytes_rejected() {
        assert!(FontdueTypeface::from_bytes(b"not a font".to_vec()).is_err());
    }

    #[test]
    fn test_line_height_rounds_up() {
        let metrics = VerticalMetrics {
            ascent: 24.2,
            descent: -6.1,
            line_gap: 0.0,
        };
        assert_eq!(metrics.line_height(), 31);
    }

    #[test]
    fn test_block_typeface_measures_text() {
        assert_eq!(BlockTypeface.text_width("abcd", 20.0), 40.0);
    }
}
