//! reelcast: record rendered frame sequences to MP4 and broadcast them
//! live, on a deterministic timebase.
//!
//! The pipeline films content produced by a [`render::FrameSource`] at a
//! fixed virtual frame rate, encodes it with openh264, writes an MP4
//! container with muxide, and fans encoded samples out to any number of
//! live destinations with per-destination failure isolation.
//!
//! # Architecture
//! - [`timing`]: the deterministic [`timing::VirtualClock`] and the
//!   fixed-rate [`timing::FrameTimer`]
//! - [`queue`]: the bounded frame queue between capture and encoding
//! - [`encoding`]: pixel conversion, H.264 encoding, container writing,
//!   and the sink worker
//! - [`streaming`]: the destination seams and the fan-out multiplexer
//! - [`recorder`]: the state machine that drives everything
//!
//! # Usage
//! ```rust,ignore
//! use reelcast::testing::SyntheticSource;
//! use reelcast::{Recorder, RenderSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let settings = RenderSettings::new(1280, 720, 30.0)
//!     .with_capture_duration(Duration::from_secs(5))
//!     .with_save_video_file(true);
//! let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(1280, 720)));
//! recorder.start()?;
//! recorder.completed().await;
//! ```

pub mod audio;
pub mod config;
pub mod encoding;
pub mod errors;
pub mod export;
pub mod queue;
pub mod recorder;
pub mod render;
pub mod streaming;
pub mod testing;
pub mod timing;
pub mod types;

// Re-exports for convenience
pub use config::{H264Profile, LivestreamSettings, RecordingQuality, RenderSettings};
pub use errors::{ReelError, ReelResult};
pub use queue::FrameQueue;
pub use recorder::{Recorder, RecorderEvent, RecordingOutcome, RecordingState};
pub use render::FrameSource;
pub use types::{EncodedSample, VideoFrame};

/// Initialize logging for the pipeline.
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "reelcast=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
