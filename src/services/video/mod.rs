// Video services
// Segment construction, timeline assembly and the ffmpeg encoder

pub mod encoder;
pub mod segment;
pub mod timeline;

pub use encoder::{ExportJob, FfmpegEncoder, JobSegment, MediaEncoder, Transition};
pub use segment::SegmentBuilder;
pub use timeline::{TimelineAssembler, align_to_narration};
