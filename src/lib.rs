// newsreel: short news texts in, narrated slideshow video out

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use models::{ExportOutcome, NewsItem};
pub use pipeline::{Backends, ReelPipeline};
