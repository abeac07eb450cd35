//! Merge pipeline
//!
//! ```text
//! UploadedFile[] --decoder--> AudioSegment[] --append--> AudioSegment
//!                --encoder--> MP3 bytes --tagger--> MergedOutput
//! ```

pub mod decoder;
pub mod encoder;
pub mod merger;
pub mod progress;
pub mod resampler;
pub mod segment;
pub mod tagger;

pub use encoder::EXPORT_BITRATE_KBPS;
pub use merger::{MergePipeline, MergeSettings};
pub use progress::{EventBusProgress, NullProgress, ProgressSink, ProgressUpdate};
pub use segment::AudioSegment;
