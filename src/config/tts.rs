//! Конфигурация синтеза речи
//!
//! Параметры TTS-бэкенда и лимиты параллельных запросов.

use serde::{Deserialize, Serialize};

/// Модель TTS для использования с OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TtsModel {
    /// Стандартная модель
    #[default]
    Standard,
    /// Модель высокого качества
    HighDefinition,
}

impl TtsModel {
    /// Получить строковое представление модели
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "tts-1",
            Self::HighDefinition => "tts-1-hd",
        }
    }
}

/// Формат аудио, который запрашивается у бэкенда
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Mp3,
    Wav,
    Aac,
    Flac,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Aac => "aac",
            Self::Flac => "flac",
        }
    }

    /// Расширение файла для сохранённого клипа
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

/// Конфигурация TTS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Включён ли синтез речи. Без него сегменты получают длительность по умолчанию
    pub enabled: bool,
    /// API ключ для OpenAI
    pub api_key: String,
    /// Базовый URL API
    pub base_url: String,
    /// Модель TTS
    pub model: TtsModel,
    /// Идентификатор голоса
    pub voice: String,
    /// Скорость речи (0.25 до 4.0)
    pub speed: f32,
    /// Формат ответа
    pub response_format: AudioEncoding,
    /// Максимальное количество одновременных запросов к API
    pub max_concurrent_requests: usize,
    /// Количество попыток на один запрос
    pub max_attempts: u32,
    /// Таймаут запроса в секундах
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: TtsModel::default(),
            voice: "alloy".to_string(),
            speed: 1.0,
            response_format: AudioEncoding::default(),
            max_concurrent_requests: 4,
            max_attempts: 3,
            request_timeout_secs: 60,
        }
    }
}

/// Возвращает список доступных голосов TTS.
pub fn available_voices() -> Vec<String> {
    vec![
        "alloy".to_string(),
        "echo".to_string(),
        "fable".to_string(),
        "onyx".to_string(),
        "nova".to_string(),
        "shimmer".to_string(),
    ]
}
