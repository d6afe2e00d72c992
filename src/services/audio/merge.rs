use log::info;
use std::path::Path;

use crate::errors::{AppError, AppResult};
use crate::models::AudioClip;
use crate::services::audio::format::{decode_audio_file, encode_wav};

/// Decoded PCM of one clip
#[derive(Clone, Debug)]
pub struct AudioFragment {
    /// Аудио данные (PCM, 32-bit float, mono)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFragment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Concatenate fragments, overlapping neighbours by `crossfade_ms` with a raised-cosine blend.
///
/// The overlap is clamped to half of the shorter neighbour, so every fragment starts after the previous one.
pub fn merge_fragments_with_crossfade(
    fragments: &[AudioFragment],
    crossfade_ms: u32,
) -> AppResult<Vec<f32>> {
    merge_with_offsets(fragments, crossfade_ms).map(|(samples, _)| samples)
}

/// Same as [`merge_fragments_with_crossfade`], also returns the sample index where each fragment starts
fn merge_with_offsets(fragments: &[AudioFragment], crossfade_ms: u32) -> AppResult<(Vec<f32>, Vec<usize>)> {
    if fragments.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let sample_rate = fragments[0].sample_rate;
    if !fragments.iter().all(|f| f.sample_rate == sample_rate) {
        return Err(AppError::AudioProcessingError(
            "All narration clips must share one sample rate".to_string(),
        ));
    }

    let crossfade_samples = (crossfade_ms as u64 * sample_rate as u64 / 1000) as usize;
    let total: usize = fragments.iter().map(|f| f.len()).sum();
    let mut result: Vec<f32> = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(fragments.len());
    let mut previous_len = 0;

    for fragment in fragments {
        let overlap = crossfade_samples.min(previous_len / 2).min(fragment.len() / 2);
        previous_len = fragment.len();
        let fade_start = result.len() - overlap;
        offsets.push(fade_start);

        for j in 0..overlap {
            let fade_out = 0.5 * (1.0 + ((std::f32::consts::PI * j as f32) / overlap as f32).cos());
            let fade_in = 1.0 - fade_out;
            result[fade_start + j] = result[fade_start + j] * fade_out + fragment.samples[j] * fade_in;
        }
        result.extend_from_slice(&fragment.samples[overlap..]);
    }

    Ok((result, offsets))
}

/// Mixed narration track and where each clip starts on it
#[derive(Debug, Clone, PartialEq)]
pub struct MixedNarration {
    pub track: AudioClip,
    /// Начало каждого клипа на дорожке, в секундах, в порядке входа
    pub clip_starts: Vec<f64>,
}

impl MixedNarration {
    /// Time from the start of clip `i` to the start of the next one (or to the end of the track)
    pub fn clip_spans(&self) -> Vec<f64> {
        self.clip_starts
            .iter()
            .enumerate()
            .map(|(i, start)| {
                let end = self
                    .clip_starts
                    .get(i + 1)
                    .copied()
                    .unwrap_or(self.track.duration_secs);
                end - start
            })
            .collect()
    }
}

/// Mixes all narration clips into one WAV track
#[derive(Debug, Clone)]
pub struct NarrationMixer {
    crossfade_ms: u32,
}

impl NarrationMixer {
    pub fn new(crossfade_ms: u32) -> Self {
        Self { crossfade_ms }
    }

    pub fn mix(&self, clips: &[AudioClip], output: &Path) -> AppResult<MixedNarration> {
        if clips.is_empty() {
            return Err(AppError::AudioProcessingError(
                "No narration clips to mix".to_string(),
            ));
        }

        let fragments = clips
            .iter()
            .map(|clip| {
                decode_audio_file(&clip.path).map(|(samples, rate)| AudioFragment::new(samples, rate))
            })
            .collect::<AppResult<Vec<_>>>()?;
        let sample_rate = fragments[0].sample_rate;

        let (samples, offsets) = merge_with_offsets(&fragments, self.crossfade_ms)?;
        encode_wav(&samples, sample_rate, output)?;

        let duration_secs = samples.len() as f64 / sample_rate as f64;
        info!(
            "Narration track: {} clips, {:.2}s, {}ms crossfade -> {}",
            clips.len(),
            duration_secs,
            self.crossfade_ms,
            output.display()
        );
        Ok(MixedNarration {
            track: AudioClip {
                path: output.to_path_buf(),
                duration_secs,
                sample_rate,
            },
            clip_starts: offsets
                .into_iter()
                .map(|offset| offset as f64 / sample_rate as f64)
                .collect(),
        })
    }
}
