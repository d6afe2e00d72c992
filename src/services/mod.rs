// Services module
// Each stage of the news reel pipeline lives in its own submodule

pub mod assets;
pub mod audio;
pub mod overlay;
pub mod text;
pub mod tts;
pub mod video;
