//! # Audio Format Handling
//!
//! Декодирование клипов озвучки в PCM, измерение длительности и запись WAV.
//!
//! - WAV читается и пишется через `hound`
//! - MP3, AAC, FLAC декодируются через Symphonia
//! - Многоканальное аудио сводится в моно

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::{AppError, AppResult};

/// Длительность в секундах по количеству кадров и частоте дискретизации
pub fn duration_in_seconds(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Длительность аудиофайла в секундах и его частота дискретизации
pub fn probe_duration(path: &Path) -> AppResult<(f64, u32)> {
    if is_wav(path) {
        let reader = WavReader::open(path)?;
        let sample_rate = reader.spec().sample_rate;
        return Ok((duration_in_seconds(reader.duration() as u64, sample_rate), sample_rate));
    }

    let (mut format, track_id) = open_with_symphonia(path)?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .ok_or_else(|| AppError::AudioProcessingError("Audio track disappeared".to_string()))?;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    if let Some(frames) = track.codec_params.n_frames {
        return Ok((duration_in_seconds(frames, sample_rate), sample_rate));
    }

    // Контейнер не знает длину: считаем декодированные кадры
    let codec_params = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::AudioProcessingError(format!("Cannot create decoder: {}", e)))?;
    let mut frames = 0u64;
    for_each_packet(format.as_mut(), track_id, |packet| match decoder.decode(packet) {
        Ok(decoded) => frames += decoded.frames() as u64,
        Err(e) => warn!("Skipping undecodable packet: {}", e),
    })?;
    Ok((duration_in_seconds(frames, sample_rate), sample_rate))
}

/// Декодирует аудиофайл в моно PCM (f32) и возвращает частоту дискретизации
pub fn decode_audio_file(path: &Path) -> AppResult<(Vec<f32>, u32)> {
    if is_wav(path) {
        return decode_wav(path);
    }

    let (mut format, track_id) = open_with_symphonia(path)?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .ok_or_else(|| AppError::AudioProcessingError("Audio track disappeared".to_string()))?;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::AudioProcessingError(format!("Cannot create decoder: {}", e)))?;

    let mut pcm = Vec::new();
    for_each_packet(format.as_mut(), track_id, |packet| match decoder.decode(packet) {
        Ok(decoded) => {
            let channels = decoded.spec().channels.count().max(1);
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            buf.copy_interleaved_ref(decoded);
            downmix_into(buf.samples(), channels, &mut pcm);
        }
        Err(e) => warn!("Skipping undecodable packet: {}", e),
    })?;

    debug!("Decoded {} samples at {} Hz from {}", pcm.len(), sample_rate, path.display());
    Ok((pcm, sample_rate))
}

fn decode_wav(path: &Path) -> AppResult<(Vec<f32>, u32)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut pcm = Vec::with_capacity(interleaved.len() / channels);
    downmix_into(&interleaved, channels, &mut pcm);
    Ok((pcm, spec.sample_rate))
}

fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

fn open_with_symphonia(path: &Path) -> AppResult<(Box<dyn FormatReader>, u32)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions {
                enable_gapless: false,
                ..Default::default()
            },
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::AudioProcessingError(format!("Unrecognized audio format: {}", e)))?;

    let format = probed.format;
    let track_id = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| t.id)
        .ok_or_else(|| AppError::AudioProcessingError("No audio track found".to_string()))?;
    Ok((format, track_id))
}

fn for_each_packet(
    format: &mut dyn FormatReader,
    track_id: u32,
    mut on_packet: impl FnMut(&symphonia::core::formats::Packet),
) -> AppResult<()> {
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    on_packet(&packet);
                }
            }
            // Конец потока
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(SymphoniaError::ResetRequired) => return Ok(()),
            Err(e) => {
                return Err(AppError::AudioProcessingError(format!(
                    "Failed to read audio packet: {}",
                    e
                )));
            }
        }
    }
}

/// Записывает моно PCM в 16-битный WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32, path: &Path) -> AppResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(v)?;
    }
    writer.finalize()?;
    Ok(())
}
