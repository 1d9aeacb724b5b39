//! Container writer seam and the MP4 implementation.

use crate::config::RenderSettings;
use crate::errors::{ReelError, ReelResult};
use muxide::api::{Metadata, MuxerBuilder, VideoCodec};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Statistics reported by a finalized container writer.
#[derive(Debug, Clone)]
pub struct ContainerStats {
    /// Total number of video frames written
    pub frames_written: u64,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
}

/// Flow-controlled sink for encoded video samples.
///
/// The encoding sink consults [`ContainerWriter::is_ready`] before every
/// append; a sample arriving while the writer is not ready is dropped
/// for file purposes (the documented lossy backpressure policy) and
/// still forwarded to streaming.
pub trait ContainerWriter: Send {
    /// Whether the writer can accept another sample right now.
    fn is_ready(&self) -> bool;

    /// Append one encoded sample at the given presentation time.
    fn append_video(&mut self, pts: f64, data: &[u8], keyframe: bool) -> ReelResult<()>;

    /// Finalize the container and report what was written.
    fn finalize(self: Box<Self>) -> ReelResult<ContainerStats>;
}

/// MP4 container writer backed by muxide.
pub struct Mp4Writer {
    muxer: muxide::api::Muxer<BufWriter<File>>,
}

impl Mp4Writer {
    /// Create the container file with a video track configured from the
    /// session settings.
    pub fn create(path: &Path, settings: &RenderSettings) -> ReelResult<Self> {
        let file = File::create(path)
            .map_err(|e| ReelError::Setup(format!("failed to create output file: {e}")))?;
        let writer = BufWriter::new(file);

        let metadata = Metadata::new()
            .with_title(&settings.name)
            .with_current_time();

        let muxer = MuxerBuilder::new(writer)
            .video(
                VideoCodec::H264,
                settings.width,
                settings.height,
                settings.fps,
            )
            .with_fast_start(true)
            .with_metadata(metadata)
            .build()
            .map_err(|e| ReelError::Setup(format!("failed to create muxer: {e}")))?;

        Ok(Self { muxer })
    }
}

impl ContainerWriter for Mp4Writer {
    fn is_ready(&self) -> bool {
        // A buffered file writer never applies backpressure; the seam
        // exists for writers that can stall (and for tests).
        true
    }

    fn append_video(&mut self, pts: f64, data: &[u8], keyframe: bool) -> ReelResult<()> {
        self.muxer
            .write_video(pts, data, keyframe)
            .map_err(|e| ReelError::Muxing(format!("failed to write frame: {e}")))
    }

    fn finalize(self: Box<Self>) -> ReelResult<ContainerStats> {
        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| ReelError::Muxing(format!("failed to finalize recording: {e}")))?;

        Ok(ContainerStats {
            frames_written: stats.video_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_writer_creation() {
        let path = temp_dir().join("reelcast_writer_test.mp4");
        let settings = RenderSettings::new(640, 480, 30.0);

        let writer = Mp4Writer::create(&path, &settings);
        assert!(writer.is_ok(), "Writer should be created successfully");
        assert!(writer.unwrap().is_ready());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_writer_rejects_bad_path() {
        let settings = RenderSettings::new(640, 480, 30.0);
        let result = Mp4Writer::create(Path::new("/nonexistent-dir/out.mp4"), &settings);
        assert!(matches!(result, Err(ReelError::Setup(_))));
    }
}
