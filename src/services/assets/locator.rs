use log::info;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::models::ImageAsset;

/// Finds the images of a news item by the `<prefix><news_id>_<index>.<ext>` convention
#[derive(Debug, Clone)]
pub struct AssetLocator {
    image_dir: PathBuf,
    prefix: String,
    extension: String,
}

impl AssetLocator {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            image_dir: paths.image_dir.clone(),
            prefix: paths.image_prefix.clone(),
            extension: paths.image_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Expected path of image `index` (1-based) of a news item
    pub fn image_path(&self, news_id: u32, index: u32) -> PathBuf {
        self.image_dir.join(format!(
            "{}{}_{}.{}",
            self.prefix, news_id, index, self.extension
        ))
    }

    /// Probe index 1, 2, ... and stop at the first missing file.
    ///
    /// An empty result means "skip this item", not an error.
    pub fn locate(&self, news_id: u32) -> Vec<ImageAsset> {
        let assets: Vec<ImageAsset> = (1u32..)
            .map(|index| (index, self.image_path(news_id, index)))
            .take_while(|(_, path)| path.is_file())
            .map(|(index, path)| ImageAsset {
                path,
                news_id,
                index,
            })
            .collect();
        info!("Found {} images for news item {}", assets.len(), news_id);
        assets
    }
}
