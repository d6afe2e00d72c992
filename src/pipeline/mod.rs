//! # Reel Pipeline
//!
//! Оркестратор: новости → изображения → фрагменты текста → озвучка и кадры →
//! сегменты → единый видеофайл.
//!
//! Задачи по фрагментам выполняются параллельно, их число ограничено семафором.
//! Ошибка одного фрагмента или одной новости не останавливает прогон.

use futures::future::join_all;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::Sender;

use crate::config::{AppConfig, AudioMode};
use crate::errors::{AppError, AppResult};
use crate::events::{ProgressUpdate, send_progress};
use crate::models::{AudioClip, ExportOutcome, FrameSize, ImageAsset, NewsItem, TextChunk, VideoSegment};
use crate::services::assets::{AssetLocator, ImageBackend, ImageGenerator, OpenAiImageClient};
use crate::services::audio::NarrationMixer;
use crate::services::overlay::{FontdueTypeface, OverlayRenderer, Typeface};
use crate::services::text::TextSegmenter;
use crate::services::tts::{NarrationSynthesizer, OpenAiSpeechClient, SpeechBackend};
use crate::services::video::{FfmpegEncoder, MediaEncoder, SegmentBuilder, TimelineAssembler, align_to_narration};
use crate::utils::tools::find_ffmpeg;

/// Внешние зависимости конвейера
pub struct Backends {
    pub speech: Option<Arc<dyn SpeechBackend>>,
    pub images: Option<Arc<dyn ImageBackend>>,
    pub typeface: Arc<dyn Typeface>,
    pub encoder: Arc<dyn MediaEncoder>,
}

impl Backends {
    /// Real backends described by the configuration: OpenAI clients, the font file and ffmpeg
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let speech: Option<Arc<dyn SpeechBackend>> = if config.tts.enabled {
            Some(Arc::new(OpenAiSpeechClient::new(&config.tts)?))
        } else {
            None
        };
        let images: Option<Arc<dyn ImageBackend>> = if config.images.enabled {
            Some(Arc::new(OpenAiImageClient::new(&config.images)?))
        } else {
            None
        };
        let typeface = Arc::new(FontdueTypeface::from_file(&config.overlay.font_path)?);
        let ffmpeg = find_ffmpeg()?;
        let encoder = Arc::new(FfmpegEncoder::new(ffmpeg.path, config.pipeline.export_timeout_secs));

        Ok(Self {
            speech,
            images,
            typeface,
            encoder,
        })
    }
}

/// Shared state of one chunk job
struct ChunkContext {
    synthesizer: Option<NarrationSynthesizer>,
    voice: String,
    renderer: OverlayRenderer,
    builder: SegmentBuilder,
    frame_size: FrameSize,
    frames_dir: PathBuf,
    transition: Option<f64>,
}

pub struct ReelPipeline {
    locator: AssetLocator,
    segmenter: TextSegmenter,
    generator: Option<ImageGenerator>,
    chunks: Arc<ChunkContext>,
    mixer: Option<NarrationMixer>,
    audio_dir: PathBuf,
    assembler: TimelineAssembler,
    max_concurrent: usize,
    progress: Option<Sender<ProgressUpdate>>,
}

impl ReelPipeline {
    /// Проверка конфигурации и подготовка директорий. Ошибки здесь фатальны
    pub fn new(config: &AppConfig, backends: Backends) -> AppResult<Self> {
        config.validate()?;
        config.prepare_dirs()?;

        let locator = AssetLocator::new(&config.paths);
        let generator = backends.images.map(|backend| {
            ImageGenerator::new(backend, locator.clone(), config.images.images_per_item)
        });
        let synthesizer = backends.speech.map(|backend| {
            NarrationSynthesizer::new(backend, &config.paths.audio_dir, config.tts.response_format)
        });
        let mixer = match config.audio.mode {
            AudioMode::Narration => Some(NarrationMixer::new(config.audio.crossfade_ms)),
            AudioMode::PerSegment => None,
        };

        let chunks = Arc::new(ChunkContext {
            synthesizer,
            voice: config.tts.voice.clone(),
            renderer: OverlayRenderer::new(&config.overlay, backends.typeface),
            builder: SegmentBuilder::new(config.video.default_segment_secs),
            frame_size: config.video.frame_size(),
            frames_dir: config.paths.frames_dir.clone(),
            transition: config.video.transition_secs,
        });

        let assembler = TimelineAssembler::new(
            backends.encoder,
            config.video.frame_size(),
            config.video.fps,
            &config.paths.output_path,
            config.pipeline.cleanup_temp_files,
        );

        Ok(Self {
            locator,
            segmenter: TextSegmenter::new(&config.text),
            generator,
            chunks,
            mixer,
            audio_dir: config.paths.audio_dir.clone(),
            assembler,
            max_concurrent: config.tts.max_concurrent_requests.max(1),
            progress: None,
        })
    }

    pub fn with_progress(mut self, sender: Sender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Run the whole flow for the given news items
    pub async fn run(&self, items: &[NewsItem]) -> AppResult<ExportOutcome> {
        info!("Starting news reel for {} items", items.len());
        send_progress(&self.progress, ProgressUpdate::Started { items: items.len() }).await;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::new();

        for item in items {
            send_progress(
                &self.progress,
                ProgressUpdate::NewsItem {
                    id: item.id,
                    total: items.len(),
                },
            )
            .await;

            let pairs = match self.prepare_item(item).await {
                Ok(pairs) => pairs,
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping news item {}: {}", item.id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for (asset, chunk) in pairs {
                let semaphore = semaphore.clone();
                let ctx = self.chunks.clone();
                let id = chunk.id();
                let task = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Other(format!("Semaphore closed: {}", e)))?;
                    process_chunk(ctx, asset, chunk).await
                });
                tasks.push((id, task));
            }
        }

        let results = join_all(tasks.into_iter().map(|(id, task)| async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(AppError::Other(format!("Chunk task failed: {}", e))),
            };
            (id, result)
        }))
        .await;

        let mut segments: Vec<VideoSegment> = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(segment) => {
                    send_progress(
                        &self.progress,
                        ProgressUpdate::ChunkReady {
                            news_id: id.news_id,
                            chunk: id.index,
                        },
                    )
                    .await;
                    segments.push(segment);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", id, e);
                    send_progress(
                        &self.progress,
                        ProgressUpdate::ChunkSkipped {
                            news_id: id.news_id,
                            chunk: id.index,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        segments.sort_by_key(|s| s.id);

        let narration = match &self.mixer {
            Some(mixer) if !segments.is_empty() && segments.iter().all(|s| s.audio.is_some()) => {
                send_progress(&self.progress, ProgressUpdate::MixingNarration).await;
                match self.mix_narration(mixer, &mut segments).await {
                    Ok(track) => Some(track),
                    Err(e) => {
                        error!("Narration mix failed: {}", e);
                        send_progress(&self.progress, ProgressUpdate::Finished).await;
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        send_progress(
            &self.progress,
            ProgressUpdate::Exporting {
                segments: segments.len(),
            },
        )
        .await;
        let outcome = self.assembler.assemble(segments, narration).await;
        match &outcome {
            Ok(ExportOutcome::Exported {
                path,
                segments,
                duration_secs,
            }) => info!(
                "Video ready: {} ({} segments, {:.2}s)",
                path.display(),
                segments,
                duration_secs
            ),
            Ok(ExportOutcome::NothingToExport) => warn!("Nothing to export: no segment was produced"),
            Err(e) => error!("Export failed: {}", e),
        }
        send_progress(&self.progress, ProgressUpdate::Finished).await;
        outcome
    }

    /// Сводит клипы в одну дорожку и подгоняет под неё длительности сегментов.
    ///
    /// При ошибке удаляется только недописанная дорожка, клипы сегментов остаются
    /// на диске, как и при ошибке экспорта.
    async fn mix_narration(
        &self,
        mixer: &NarrationMixer,
        segments: &mut [VideoSegment],
    ) -> AppResult<AudioClip> {
        let clips: Vec<AudioClip> = segments.iter().filter_map(|s| s.audio.clone()).collect();
        let output = self.audio_dir.join(format!("narration_{}.wav", uuid::Uuid::new_v4()));

        let mixer = mixer.clone();
        let track_path = output.clone();
        let mixed = tokio::task::spawn_blocking(move || mixer.mix(&clips, &track_path))
            .await
            .map_err(|e| AppError::ExportError(format!("Narration mix task failed: {}", e)))
            .and_then(|mixed| mixed.map_err(|e| AppError::ExportError(format!("Narration mix: {}", e))))
            .and_then(|mixed| {
                align_to_narration(segments, &mixed)?;
                Ok(mixed.track)
            });

        if mixed.is_err() && output.exists() {
            if let Err(e) = std::fs::remove_file(&output) {
                warn!("Failed to remove narration track {}: {}", output.display(), e);
            }
        }
        mixed
    }

    /// Images of the item paired 1:1 with its text chunks
    async fn prepare_item(&self, item: &NewsItem) -> AppResult<Vec<(ImageAsset, TextChunk)>> {
        let mut assets = self.locator.locate(item.id);
        if assets.is_empty() {
            match &self.generator {
                Some(generator) => {
                    info!("No images for news item {}, generating", item.id);
                    assets = generator.generate_for(item).await.map_err(|e| {
                        warn!("Image generation failed for news item {}: {}", item.id, e);
                        AppError::AssetNotFound { news_id: item.id }
                    })?;
                }
                None => return Err(AppError::AssetNotFound { news_id: item.id }),
            }
        }

        let chunks = self.segmenter.segment_with(item, assets.len())?;
        if chunks.is_empty() {
            warn!("News item {} has no text, skipping", item.id);
            return Ok(Vec::new());
        }
        if chunks.len() != assets.len() {
            let kept = chunks.len().min(assets.len());
            warn!(
                "News item {}: {} images and {} text chunks, keeping {} (dropped {} images, {} chunks)",
                item.id,
                assets.len(),
                chunks.len(),
                kept,
                assets.len() - kept,
                chunks.len() - kept
            );
        }
        info!("News item {}: {} segments", item.id, chunks.len().min(assets.len()));
        Ok(assets.into_iter().zip(chunks).collect())
    }
}

/// Озвучка и кадр для одного фрагмента. Любая ошибка стоит только этого сегмента
async fn process_chunk(
    ctx: Arc<ChunkContext>,
    asset: ImageAsset,
    chunk: TextChunk,
) -> AppResult<VideoSegment> {
    let id = chunk.id();
    let audio = match &ctx.synthesizer {
        Some(synthesizer) => Some(synthesizer.synthesize(&chunk, &ctx.voice).await?),
        None => None,
    };
    let clip_path = audio.as_ref().map(|clip| clip.path.clone());

    let render_ctx = ctx.clone();
    let segment = tokio::task::spawn_blocking(move || {
        render_ctx.renderer.render_to_file(
            &asset.path,
            &chunk.content,
            render_ctx.frame_size,
            &render_ctx.frames_dir,
        )
    })
    .await
    .map_err(|e| AppError::RenderError(format!("Render task failed: {}", e)))
    .and_then(|rendered| {
        rendered.map_err(|e| match e {
            AppError::RenderError(_) => e,
            other => AppError::RenderError(format!("{}: {}", id, other)),
        })
    })
    .and_then(|frame_path| ctx.builder.build(id, frame_path, audio, ctx.transition));

    if segment.is_err() {
        // сегмента не будет, озвучка больше не нужна
        if let Some(path) = clip_path {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove clip {}: {}", path.display(), e);
            }
        }
    }
    segment
}

#[cfg(test)]
mod tests {
    mod test_pipeline;
}
