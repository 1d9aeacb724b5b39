//! Frame source collaborator interface.

use crate::errors::ReelResult;
use image::RgbaImage;

/// Pull-based producer of rendered frames.
///
/// The capture loop calls this once per scheduled tick with the virtual
/// presentation timestamp of the frame it wants. Implementations render
/// whatever their content looks like at that instant; returning an error
/// means the content was not ready, and the tick is skipped without
/// advancing the frame counter.
pub trait FrameSource: Send + Sync {
    /// Produce one frame for the given virtual timestamp in seconds.
    fn produce_frame(&self, pts: f64) -> ReelResult<RgbaImage>;
}
