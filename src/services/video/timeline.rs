use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::models::{AudioClip, ExportOutcome, FrameSize, VideoSegment};
use crate::services::audio::MixedNarration;
use crate::services::video::encoder::{ExportJob, JobSegment, MediaEncoder, Transition};
use crate::utils::temp::ScratchFiles;

/// Orders segments, resolves transitions and hands the timeline to the encoder
pub struct TimelineAssembler {
    encoder: Arc<dyn MediaEncoder>,
    frame_size: FrameSize,
    fps: u32,
    output: PathBuf,
    cleanup_audio: bool,
}

impl TimelineAssembler {
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        frame_size: FrameSize,
        fps: u32,
        output: impl Into<PathBuf>,
        cleanup_audio: bool,
    ) -> Self {
        Self {
            encoder,
            frame_size,
            fps,
            output: output.into(),
            cleanup_audio,
        }
    }

    /// Export all segments into one file.
    ///
    /// With a narration track the per-segment clips are not muxed, the track covers the whole picture.
    pub async fn assemble(
        &self,
        mut segments: Vec<VideoSegment>,
        narration: Option<AudioClip>,
    ) -> AppResult<ExportOutcome> {
        if segments.is_empty() {
            info!("No segments to export");
            return Ok(ExportOutcome::NothingToExport);
        }

        segments.sort_by_key(|s| s.id);
        let mut seen = HashSet::new();
        for segment in &segments {
            if !seen.insert(segment.id) {
                return Err(AppError::ExportError(format!("Duplicate segment for {}", segment.id)));
            }
            if !segment.duration_secs.is_finite() || segment.duration_secs <= 0.0 {
                return Err(AppError::ExportError(format!(
                    "{} has invalid duration {}",
                    segment.id, segment.duration_secs
                )));
            }
        }

        let transitions = resolve_transitions(&segments);
        let job = ExportJob {
            segments: segments
                .iter()
                .zip(transitions)
                .map(|(segment, transition)| JobSegment {
                    frame_path: segment.frame_path.clone(),
                    duration_secs: segment.duration_secs,
                    audio_path: if narration.is_some() {
                        None
                    } else {
                        segment.audio.as_ref().map(|clip| clip.path.clone())
                    },
                    transition,
                })
                .collect(),
            narration: narration.as_ref().map(|clip| clip.path.clone()),
            frame_size: self.frame_size,
            fps: self.fps,
            output: self.output.clone(),
        };

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!(
            "Exporting {} segments ({:.2}s) to {}",
            job.segments.len(),
            job.total_duration(),
            self.output.display()
        );
        self.encoder.export(&job).await.map_err(|e| match e {
            AppError::ExportError(_) => e,
            other => AppError::ExportError(other.to_string()),
        })?;

        if self.cleanup_audio {
            let mut scratch = ScratchFiles::new();
            for clip in segments.iter().filter_map(|s| s.audio.as_ref()) {
                scratch.track(&clip.path);
            }
            if let Some(clip) = &narration {
                scratch.track(&clip.path);
            }
            let failed = scratch.cleanup();
            if failed > 0 {
                warn!("{} temporary audio files could not be removed", failed);
            }
        }

        Ok(ExportOutcome::Exported {
            path: self.output.clone(),
            segments: job.segments.len(),
            duration_secs: job.total_duration(),
        })
    }
}

/// Переход первого сегмента становится затемнением из чёрного,
/// остальные становятся кроссфейдами не длиннее половины более короткого соседа
pub fn resolve_transitions(segments: &[VideoSegment]) -> Vec<Option<Transition>> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let requested = segment.transition_in.filter(|t| t.is_finite() && *t > 0.0)?;
            if i == 0 {
                return Some(Transition::FadeFromBlack(requested.min(segment.duration_secs)));
            }
            let limit = segments[i - 1].duration_secs.min(segment.duration_secs) / 2.0;
            let clamped = requested.min(limit);
            if clamped < requested {
                warn!(
                    "Transition into {} shortened from {:.3}s to {:.3}s",
                    segment.id, requested, clamped
                );
            }
            (clamped > 0.0).then_some(Transition::Crossfade(clamped))
        })
        .collect()
}

/// Подгоняет картинку под сведённую дорожку озвучки.
///
/// Каждый сегмент длится до начала следующего клипа на дорожке, поэтому подпись
/// появляется вместе со своей фразой. Переходы между сегментами снимаются: кроссфейд
/// картинки сдвинул бы кадры относительно речи. Затемнение в начале остаётся.
pub fn align_to_narration(segments: &mut [VideoSegment], narration: &MixedNarration) -> AppResult<()> {
    if segments.len() != narration.clip_starts.len() {
        return Err(AppError::ExportError(format!(
            "Narration has {} clips for {} segments",
            narration.clip_starts.len(),
            segments.len()
        )));
    }

    for (i, (segment, span)) in segments.iter_mut().zip(narration.clip_spans()).enumerate() {
        if !span.is_finite() || span <= 0.0 {
            return Err(AppError::ExportError(format!(
                "{} gets no time on the narration track ({:.3}s)",
                segment.id, span
            )));
        }
        segment.duration_secs = span;
        if i > 0 && segment.transition_in.take().is_some() {
            debug!("Transition into {} dropped, narration sets the cut", segment.id);
        }
    }
    Ok(())
}
