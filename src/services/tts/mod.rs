// TTS services
// Narration synthesis for text chunks

use bytes::Bytes;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AudioEncoding;
use crate::errors::{AppError, AppResult};
use crate::models::{AudioClip, TextChunk};
use crate::services::audio::probe_duration;

pub mod openai;

pub use openai::OpenAiSpeechClient;

/// TTS backend: text and voice in, encoded audio bytes out
#[async_trait::async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes>;
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Подготовка текста к озвучке: переводы строк в пробелы, схлопывание пробелов,
/// точка в конце, если нет завершающего знака
pub fn normalize_for_speech(text: &str) -> String {
    let mut result = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    if let Some(last) = result.chars().last() {
        if !".!?…".contains(last) {
            result.push('.');
        }
    }
    result
}

/// Generates per-chunk narration clips in the audio directory
pub struct NarrationSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    audio_dir: PathBuf,
    encoding: AudioEncoding,
}

impl NarrationSynthesizer {
    pub fn new(backend: Arc<dyn SpeechBackend>, audio_dir: impl Into<PathBuf>, encoding: AudioEncoding) -> Self {
        Self {
            backend,
            audio_dir: audio_dir.into(),
            encoding,
        }
    }

    /// Synthesize one chunk. Every failure is reported as a synthesis error for that chunk.
    pub async fn synthesize(&self, chunk: &TextChunk, voice: &str) -> AppResult<AudioClip> {
        let id = chunk.id();
        let path = self.audio_dir.join(format!(
            "narration_{}_{}_{}.{}",
            chunk.news_id,
            chunk.index,
            uuid::Uuid::new_v4(),
            self.encoding.extension()
        ));

        match self.synthesize_to(chunk, voice, &path).await {
            Ok(clip) => {
                info!("Narration for {} ready: {:.2}s", id, clip.duration_secs);
                Ok(clip)
            }
            Err(e) => {
                if path.exists() {
                    if let Err(rm) = std::fs::remove_file(&path) {
                        warn!("Failed to remove partial clip {}: {}", path.display(), rm);
                    }
                }
                Err(match e {
                    AppError::SynthesisError { .. } => e,
                    other => AppError::SynthesisError {
                        chunk: id,
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    async fn synthesize_to(&self, chunk: &TextChunk, voice: &str, path: &Path) -> AppResult<AudioClip> {
        let text = normalize_for_speech(&chunk.content);
        if text.is_empty() {
            return Err(AppError::SynthesisError {
                chunk: chunk.id(),
                message: "chunk has no text to narrate".to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let audio = self.backend.synthesize(&text, voice).await?;
        if audio.is_empty() {
            return Err(AppError::SynthesisError {
                chunk: chunk.id(),
                message: "backend returned empty audio".to_string(),
            });
        }
        tokio::fs::write(path, &audio).await?;

        let probe_path = path.to_path_buf();
        let (duration_secs, sample_rate) = tokio::task::spawn_blocking(move || probe_duration(&probe_path))
            .await
            .map_err(|e| AppError::Other(format!("Duration probe task failed: {}", e)))??;
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(AppError::SynthesisError {
                chunk: chunk.id(),
                message: format!("clip has no playable duration ({})", duration_secs),
            });
        }

        Ok(AudioClip {
            path: path.to_path_buf(),
            duration_secs,
            sample_rate,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::audio::encode_wav;
    use std::sync::Mutex;

    /// Возвращает WAV длиной `secs` на каждый запрос и запоминает тексты
    pub(crate) struct FakeSpeech {
        pub secs: f64,
        pub fail_on: Option<String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeSpeech {
        pub(crate) fn new(secs: f64) -> Self {
            Self {
                secs,
                fail_on: None,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SpeechBackend for FakeSpeech {
        async fn synthesize(&self, text: &str, _voice: &str) -> AppResult<Bytes> {
            self.requests.lock().unwrap().push(text.to_string());
            if let Some(marker) = &self.fail_on {
                if text.contains(marker.as_str()) {
                    return Err(AppError::ApiError("backend unavailable".to_string()));
                }
            }
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("fake.wav");
            let samples = vec![0.1f32; (self.secs * 8000.0).round() as usize];
            encode_wav(&samples, 8000, &path).unwrap();
            Ok(Bytes::from(std::fs::read(&path).unwrap()))
        }
    }

    fn chunk(content: &str) -> TextChunk {
        TextChunk {
            news_id: 4,
            index: 2,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_normalize_for_speech() {
        assert_eq!(normalize_for_speech("  first line\nsecond   line "), "first line second line.");
        assert_eq!(normalize_for_speech("Done!"), "Done!");
        assert_eq!(normalize_for_speech("   "), "");
    }

    #[tokio::test]
    async fn test_clip_duration_matches_audio() {
        let temp = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeSpeech::new(1.75));
        let synth = NarrationSynthesizer::new(backend.clone(), temp.path().join("audio"), AudioEncoding::Wav);

        let clip = synth.synthesize(&chunk("Hello\nworld"), "alloy").await.unwrap();
        assert!((clip.duration_secs - 1.75).abs() < 1e-9);
        assert_eq!(clip.sample_rate, 8000);
        assert!(clip.path.is_file());

        let name = clip.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("narration_4_2_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(backend.requests.lock().unwrap()[0], "Hello world.");
    }

    #[tokio::test]
    async fn test_each_clip_gets_unique_file() {
        let temp = tempfile::tempdir().unwrap();
        let synth = NarrationSynthesizer::new(Arc::new(FakeSpeech::new(0.5)), temp.path(), AudioEncoding::Wav);
        let a = synth.synthesize(&chunk("same"), "alloy").await.unwrap();
        let b = synth.synthesize(&chunk("same"), "alloy").await.unwrap();
        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn test_backend_failure_is_synthesis_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut backend = FakeSpeech::new(0.5);
        backend.fail_on = Some("broken".to_string());
        let synth = NarrationSynthesizer::new(Arc::new(backend), temp.path(), AudioEncoding::Wav);

        let err = synth.synthesize(&chunk("broken text"), "alloy").await.unwrap_err();
        match err {
            AppError::SynthesisError { chunk, .. } => assert_eq!(chunk.index, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_leaves_no_file() {
        struct Garbage;

        #[async_trait::async_trait]
        impl SpeechBackend for Garbage {
            async fn synthesize(&self, _text: &str, _voice: &str) -> AppResult<Bytes> {
                Ok(Bytes::from_static(b"not audio at all"))
            }
        }

        let temp = tempfile::tempdir().unwrap();
        let synth = NarrationSynthesizer::new(Arc::new(Garbage), temp.path(), AudioEncoding::Mp3);
        let err = synth.synthesize(&chunk("text"), "alloy").await.unwrap_err();
        assert!(matches!(err, AppError::SynthesisError { .. }));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
