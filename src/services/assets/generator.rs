use bytes::Bytes;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ImageGenerationConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{ImageAsset, NewsItem};
use crate::services::assets::AssetLocator;
use crate::services::text::TextSegmenter;

/// Image-generation backend: a prompt in, encoded image bytes out
#[async_trait::async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<Bytes>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Client for the OpenAI images API
pub struct OpenAiImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    size: String,
}

impl OpenAiImageClient {
    pub fn new(config: &ImageGenerationConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            size: config.size.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ImageBackend for OpenAiImageClient {
    async fn generate(&self, prompt: &str) -> AppResult<Bytes> {
        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                model: &self.model,
                prompt,
                n: 1,
                size: &self.size,
                response_format: "url",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(AppError::ApiError(format!(
                "Image generation failed ({}): {}",
                status, error
            )));
        }

        let body: ImageResponse = response.json().await?;
        let url = body
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| AppError::ApiError("Image response contained no URL".to_string()))?;

        let image = self.client.get(&url).send().await?.error_for_status()?;
        Ok(image.bytes().await?)
    }
}

/// Alternate image source: fills the image directory for items that have no pictures
pub struct ImageGenerator {
    backend: Arc<dyn ImageBackend>,
    locator: AssetLocator,
    images_per_item: u32,
}

impl ImageGenerator {
    pub fn new(backend: Arc<dyn ImageBackend>, locator: AssetLocator, images_per_item: u32) -> Self {
        Self {
            backend,
            locator,
            images_per_item: images_per_item.max(1),
        }
    }

    /// One prompt per image, each describing an even slice of the news text
    pub fn prompts_for(&self, item: &NewsItem) -> AppResult<Vec<String>> {
        let chunks = TextSegmenter::default().segment_evenly(item, self.images_per_item as usize)?;
        Ok(chunks
            .into_iter()
            .map(|c| format!("Editorial news photograph, no text or captions: {}", c.content))
            .collect())
    }

    /// Generate and store images under the locator's naming convention.
    ///
    /// Stops at the first failure so the stored files stay gap-free.
    pub async fn generate_for(&self, item: &NewsItem) -> AppResult<Vec<ImageAsset>> {
        let prompts = self.prompts_for(item)?;
        std::fs::create_dir_all(self.locator.image_dir())?;

        let mut assets = Vec::with_capacity(prompts.len());
        for (prompt, index) in prompts.iter().zip(1u32..) {
            let path = self.locator.image_path(item.id, index);
            let stored = async {
                let bytes = self.backend.generate(prompt).await?;
                let image = image::load_from_memory(&bytes)?;
                let path = path.clone();
                tokio::task::spawn_blocking(move || image.to_rgb8().save(&path))
                    .await
                    .map_err(|e| AppError::Other(format!("Image save task failed: {}", e)))??;
                Ok::<_, AppError>(())
            }
            .await;

            match stored {
                Ok(()) => {
                    info!("Generated image {} for news item {}", index, item.id);
                    assets.push(ImageAsset {
                        path,
                        news_id: item.id,
                        index,
                    });
                }
                Err(e) => {
                    warn!("Image generation stopped for news item {} at {}: {}", item.id, index, e);
                    break;
                }
            }
        }

        if assets.is_empty() {
            return Err(AppError::AssetNotFound { news_id: item.id });
        }
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeImages {
        calls: AtomicUsize,
        fail_from: usize,
    }

    #[async_trait::async_trait]
    impl ImageBackend for FakeImages {
        async fn generate(&self, _prompt: &str) -> AppResult<Bytes> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from {
                return Err(AppError::ApiError("quota".to_string()));
            }
            let img = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
            let mut buf = Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, image::ImageOutputFormat::Png)
                .unwrap();
            Ok(Bytes::from(buf.into_inner()))
        }
    }

    fn generator(dir: &std::path::Path, fail_from: usize, per_item: u32) -> ImageGenerator {
        let locator = AssetLocator::new(&PathsConfig {
            image_dir: dir.to_path_buf(),
            ..PathsConfig::default()
        });
        ImageGenerator::new(
            Arc::new(FakeImages {
                calls: AtomicUsize::new(0),
                fail_from,
            }),
            locator,
            per_item,
        )
    }

    fn item() -> NewsItem {
        NewsItem {
            id: 2,
            text: "Penguins returned to the sea after treatment for malnutrition".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generated_images_are_locatable() {
        let temp = tempfile::tempdir().unwrap();
        let generator = generator(temp.path(), usize::MAX, 3);
        let assets = generator.generate_for(&item()).await.unwrap();
        assert_eq!(assets.len(), 3);

        let located = generator.locator.locate(2);
        assert_eq!(located, assets);
    }

    #[tokio::test]
    async fn test_failure_stops_without_gap() {
        let temp = tempfile::tempdir().unwrap();
        let generator = generator(temp.path(), 1, 3);
        let assets = generator.generate_for(&item()).await.unwrap();
        assert_eq!(assets.len(), 1);
        assert!(!generator.locator.image_path(2, 2).exists());
    }

    #[tokio::test]
    async fn test_all_failures_report_missing_assets() {
        let temp = tempfile::tempdir().unwrap();
        let generator = generator(temp.path(), 0, 2);
        let err = generator.generate_for(&item()).await.unwrap_err();
        assert!(matches!(err, AppError::AssetNotFound { news_id: 2 }));
    }

    #[test]
    fn test_prompts_cover_text() {
        let temp = tempfile::tempdir().unwrap();
        let generator = generator(temp.path(), 0, 2);
        let prompts = generator.prompts_for(&item()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Penguins"));
        assert!(prompts[1].contains("malnutrition"));
    }
}
