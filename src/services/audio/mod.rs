// Audio services
// Decoding, duration measurement and narration track mixing

pub mod format;
pub mod merge;

pub use format::{decode_audio_file, encode_wav, probe_duration};
pub use merge::{MixedNarration, NarrationMixer};
