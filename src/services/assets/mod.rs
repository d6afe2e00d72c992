// Image asset services
// Discovery of per-item images and the optional generated fallback

pub mod generator;
pub mod locator;

pub use generator::{ImageBackend, ImageGenerator, OpenAiImageClient};
pub use locator::AssetLocator;
