// Text services
// Segmentation of news text into display/narration chunks

pub mod segmenter;

pub use segmenter::{TextSegmenter, wrap_words};
