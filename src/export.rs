//! Final-duration export of the captured container file.

use crate::errors::{ReelError, ReelResult};
use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Exports a duration-bounded copy of a captured file.
///
/// Invoked at finalize time when a fixed capture duration was requested;
/// the result replaces the raw capture artifact. An export failure keeps
/// the untrimmed temporary file instead of losing the recording.
pub trait ClipExporter: Send + Sync {
    fn export(&self, source: &Path, duration: Duration, dest: &Path) -> ReelResult<PathBuf>;
}

/// Exporter shelling out to the `ffmpeg` binary with a stream-copy trim.
pub struct FfmpegExporter {
    binary: PathBuf,
}

impl FfmpegExporter {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary instead of resolving from PATH.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipExporter for FfmpegExporter {
    fn export(&self, source: &Path, duration: Duration, dest: &Path) -> ReelResult<PathBuf> {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }

        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-t", &format!("{:.3}", duration.as_secs_f64())])
            .args(["-c", "copy", "-movflags", "+faststart"])
            .arg(dest)
            .output()
            .map_err(|e| ReelError::Export(format!("failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::Export(format!(
                "ffmpeg exited with error: {stderr}"
            )));
        }

        info!(
            "exported {:?} ({:.3}s) to {:?}",
            source,
            duration.as_secs_f64(),
            dest
        );
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_an_export_error() {
        let exporter = FfmpegExporter::with_binary("/nonexistent/ffmpeg");
        let result = exporter.export(
            Path::new("in.mp4"),
            Duration::from_secs(1),
            Path::new("/tmp/reelcast_export_test_out.mp4"),
        );
        assert!(matches!(result, Err(ReelError::Export(_))));
    }
}
