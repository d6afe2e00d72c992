// Configuration module
// Centralized management of application configuration

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};
use crate::models::FrameSize;

pub mod tts; // TTS configuration

pub use tts::{AudioEncoding, TtsConfig, TtsModel};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `<prefix><news_id>_<index>.<ext>` images
    pub image_dir: PathBuf,
    pub image_prefix: String,
    pub image_extension: String,
    /// Temporary narration clips
    pub audio_dir: PathBuf,
    /// Rendered overlay frames
    pub frames_dir: PathBuf,
    pub output_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("images"),
            image_prefix: "Dato".to_string(),
            image_extension: "jpg".to_string(),
            audio_dir: PathBuf::from("temp/audio"),
            frames_dir: PathBuf::from("temp/frames"),
            output_path: PathBuf::from("news_video.mp4"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Segment length when no narration audio exists
    pub default_segment_secs: f64,
    /// Crossfade between adjacent segments, in seconds
    pub transition_secs: Option<f64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 24,
            default_segment_secs: 3.0,
            transition_secs: None,
        }
    }
}

impl VideoConfig {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// How the text block is positioned on the frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayout {
    /// lines × line height, anchored a margin above the bottom edge
    #[default]
    Block,
    /// per-line glyph extents, packed upward from the bottom margin
    GlyphBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackingConfig {
    pub color: [u8; 4],
    pub padding: u32,
}

impl Default for BackingConfig {
    fn default() -> Self {
        Self {
            color: [0, 0, 0, 160],
            padding: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub font_path: PathBuf,
    pub font_size: f32,
    /// Fraction of the frame width available to a text line
    pub max_width_ratio: f32,
    pub margin: u32,
    pub text_color: [u8; 4],
    pub backing: Option<BackingConfig>,
    pub layout: OverlayLayout,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("arial.ttf"),
            font_size: 30.0,
            max_width_ratio: 0.8,
            margin: 10,
            text_color: [255, 255, 255, 255],
            backing: Some(BackingConfig::default()),
            layout: OverlayLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fixed-width wrapping grouped into the image count
    #[default]
    Wrapped,
    /// Split on the configured delimiter
    Delimiter,
    /// Words spread evenly over the image count
    Even,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub mode: SegmentationMode,
    pub wrap_width: usize,
    pub delimiter: char,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            mode: SegmentationMode::default(),
            wrap_width: 40,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Every segment carries its own clip
    #[default]
    PerSegment,
    /// One narration track mixed from all clips, attached to the whole picture
    Narration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub mode: AudioMode,
    /// Overlap between consecutive clips in the narration track
    pub crossfade_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mode: AudioMode::default(),
            crossfade_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenerationConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub size: String,
    pub images_per_item: u32,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "dall-e-3".to_string(),
            size: "1792x1024".to_string(),
            images_per_item: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Remove narration clips once the export succeeded
    pub cleanup_temp_files: bool,
    /// Upper bound for a single ffmpeg export, in seconds
    pub export_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cleanup_temp_files: true,
            export_timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub video: VideoConfig,
    pub overlay: OverlayConfig,
    pub text: TextConfig,
    pub tts: TtsConfig,
    pub audio: AudioConfig,
    pub images: ImageGenerationConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::ConfigurationError(format!(
                        "Cannot read config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid config: {}", e)))
    }

    /// Fill empty API keys from the environment
    pub fn apply_env(&mut self, api_key: Option<String>) {
        let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
            return;
        };
        if self.tts.api_key.is_empty() {
            self.tts.api_key = key.clone();
        }
        if self.images.api_key.is_empty() {
            self.images.api_key = key;
        }
    }

    /// Check values that would make the whole run fail
    pub fn validate(&self) -> AppResult<()> {
        let fail = |msg: String| Err(AppError::ConfigurationError(msg));

        if self.video.width == 0 || self.video.height == 0 {
            return fail(format!(
                "Output resolution must be positive, got {}x{}",
                self.video.width, self.video.height
            ));
        }
        if self.video.fps == 0 {
            return fail("Frame rate must be positive".to_string());
        }
        if !(self.video.default_segment_secs.is_finite() && self.video.default_segment_secs > 0.0) {
            return fail(format!(
                "Default segment duration must be positive, got {}",
                self.video.default_segment_secs
            ));
        }
        if let Some(t) = self.video.transition_secs {
            if !t.is_finite() || t < 0.0 {
                return fail(format!("Transition duration must be >= 0, got {}", t));
            }
        }
        if !(self.overlay.max_width_ratio > 0.0 && self.overlay.max_width_ratio <= 1.0) {
            return fail(format!(
                "Overlay width ratio must be in (0, 1], got {}",
                self.overlay.max_width_ratio
            ));
        }
        if !(self.overlay.font_size > 0.0) {
            return fail(format!("Font size must be positive, got {}", self.overlay.font_size));
        }
        if self.text.wrap_width == 0 {
            return fail("Wrap width must be positive".to_string());
        }
        if self.tts.max_concurrent_requests == 0 {
            return fail("max_concurrent_requests must be at least 1".to_string());
        }
        if self.tts.enabled && self.tts.api_key.trim().is_empty() {
            return fail(format!(
                "TTS is enabled but no API key is configured (set tts.api_key or {})",
                API_KEY_ENV
            ));
        }
        if self.images.enabled && self.images.api_key.trim().is_empty() {
            return fail(format!(
                "Image generation is enabled but no API key is configured (set images.api_key or {})",
                API_KEY_ENV
            ));
        }
        if self.paths.image_prefix.is_empty() || self.paths.image_extension.is_empty() {
            return fail("Image prefix and extension must not be empty".to_string());
        }
        if !self.paths.image_dir.is_dir() && !self.images.enabled {
            return fail(format!(
                "Image directory does not exist: {}",
                self.paths.image_dir.display()
            ));
        }
        if self.tts.enabled && !tts::available_voices().contains(&self.tts.voice) {
            warn!("Voice '{}' is not one of the known voices, sending as is", self.tts.voice);
        }
        Ok(())
    }

    /// Create every directory the run writes into
    pub fn prepare_dirs(&self) -> AppResult<()> {
        let mut dirs = vec![self.paths.audio_dir.clone(), self.paths.frames_dir.clone()];
        if self.images.enabled {
            dirs.push(self.paths.image_dir.clone());
        }
        if let Some(parent) = self.paths.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent.to_path_buf());
            }
        }
        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::ConfigurationError(format!(
                    "Cannot create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
