use std::path::PathBuf;

use crate::errors::{AppError, AppResult};
use crate::models::{AudioClip, ChunkId, VideoSegment};

/// Pairs a rendered frame with its narration clip
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    default_duration_secs: f64,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl SegmentBuilder {
    pub fn new(default_duration_secs: f64) -> Self {
        Self {
            default_duration_secs,
        }
    }

    /// Длительность сегмента равна длительности озвучки, без неё берётся значение по умолчанию
    pub fn build(
        &self,
        id: ChunkId,
        frame_path: PathBuf,
        audio: Option<AudioClip>,
        transition_in: Option<f64>,
    ) -> AppResult<VideoSegment> {
        let duration_secs = audio
            .as_ref()
            .map(|clip| clip.duration_secs)
            .unwrap_or(self.default_duration_secs);

        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(AppError::RenderError(format!(
                "{} has invalid duration {}",
                id, duration_secs
            )));
        }

        Ok(VideoSegment {
            id,
            frame_path,
            duration_secs,
            audio,
            transition_in: transition_in.filter(|t| t.is_finite() && *t > 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(duration_secs: f64) -> AudioClip {
        AudioClip {
            path: PathBuf::from("temp/audio/clip.mp3"),
            duration_secs,
            sample_rate: 24000,
        }
    }

    #[test]
    fn test_duration_equals_audio_duration() {
        let segment = SegmentBuilder::default()
            .build(ChunkId::new(1, 1), PathBuf::from("f.png"), Some(clip(4.37)), None)
            .unwrap();
        assert_eq!(segment.duration_secs, 4.37);
        assert_eq!(segment.audio.unwrap().duration_secs, 4.37);
    }

    #[test]
    fn test_silent_segment_uses_default() {
        let segment = SegmentBuilder::new(2.5)
            .build(ChunkId::new(1, 2), PathBuf::from("f.png"), None, None)
            .unwrap();
        assert_eq!(segment.duration_secs, 2.5);
        assert!(segment.audio.is_none());
    }

    #[test]
    fn test_zero_length_audio_is_rejected() {
        let err = SegmentBuilder::default()
            .build(ChunkId::new(2, 1), PathBuf::from("f.png"), Some(clip(0.0)), None)
            .unwrap_err();
        assert!(matches!(err, AppError::RenderError(_)));

        let err = SegmentBuilder::default()
            .build(ChunkId::new(2, 1), PathBuf::from("f.png"), Some(clip(f64::NAN)), None)
            .unwrap_err();
        assert!(matches!(err, AppError::RenderError(_)));
    }

    #[test]
    fn test_non_positive_transition_dropped() {
        let builder = SegmentBuilder::default();
        let kept = builder
            .build(ChunkId::new(1, 1), PathBuf::from("f.png"), None, Some(0.5))
            .unwrap();
        assert_eq!(kept.transition_in, Some(0.5));

        let dropped = builder
            .build(ChunkId::new(1, 1), PathBuf::from("f.png"), None, Some(-1.0))
            .unwrap();
        assert_eq!(dropped.transition_in, None);
    }
}
