// Error handling module
// Contains the application error type and the per-chunk identity it reports

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// Identity of one text chunk inside a run: news item ordinal + chunk ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub news_id: u32,
    pub index: u32,
}

impl ChunkId {
    pub fn new(news_id: u32, index: u32) -> Self {
        Self { news_id, index }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "news {} chunk {}", self.news_id, self.index)
    }
}

// Application error type
#[derive(Debug, Error, Serialize)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("No images found for news item {news_id}")]
    AssetNotFound { news_id: u32 },

    #[error("Speech synthesis failed for {chunk}: {message}")]
    SynthesisError { chunk: ChunkId, message: String },

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("IO error: {0}")]
    #[serde(serialize_with = "serialize_io_error")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(String),

    #[error(transparent)]
    #[serde(skip)]
    AnyhowError(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that cost a single chunk or news item, never the whole run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::AssetNotFound { .. }
                | AppError::SynthesisError { .. }
                | AppError::RenderError(_)
        )
    }
}

// std::io::Error does not implement serde::Serialize
fn serialize_io_error<S>(err: &std::io::Error, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&err.to_string())
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ApiError(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::RenderError(err.to_string())
    }
}

impl From<hound::Error> for AppError {
    fn from(err: hound::Error) -> Self {
        AppError::AudioProcessingError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Other(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl<T> From<SendError<T>> for AppError {
    fn from(err: SendError<T>) -> Self {
        AppError::Other(format!("Failed to send message: {}", err))
    }
}

// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_display_and_order() {
        let a = ChunkId::new(1, 2);
        let b = ChunkId::new(2, 1);
        assert!(a < b);
        assert_eq!(a.to_string(), "news 1 chunk 2");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(AppError::AssetNotFound { news_id: 3 }.is_recoverable());
        assert!(AppError::RenderError("bad jpeg".into()).is_recoverable());
        assert!(!AppError::ExportError("ffmpeg".into()).is_recoverable());
        assert!(!AppError::ConfigurationError("fps".into()).is_recoverable());
    }

    #[test]
    fn test_synthesis_error_carries_chunk() {
        let err = AppError::SynthesisError {
            chunk: ChunkId::new(4, 1),
            message: "empty audio".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Speech synthesis failed for news 4 chunk 1: empty audio"
        );
    }
}
