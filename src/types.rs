//! Core frame and sample types shared across the pipeline.

use bytes::Bytes;
use image::RgbaImage;

/// A rendered frame queued for encoding.
///
/// Produced by the frame source at a scheduled virtual timestamp and
/// owned by the frame queue until the encoding sink consumes it.
/// Immutable once enqueued.
pub struct VideoFrame {
    /// RGBA pixel payload.
    pub image: RgbaImage,
    /// Presentation timestamp in seconds of virtual time.
    pub pts: f64,
}

impl VideoFrame {
    /// Create a new frame at the given presentation timestamp.
    pub fn new(image: RgbaImage, pts: f64) -> Self {
        Self { image, pts }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pts", &self.pts)
            .finish()
    }
}

/// One encoded H.264 access unit.
///
/// The unit written to the container file and forwarded to every live
/// destination.
#[derive(Clone)]
pub struct EncodedSample {
    /// Annex B encoded payload.
    pub data: Bytes,
    /// Presentation timestamp in seconds.
    pub pts: f64,
    /// Whether the access unit contains an IDR frame.
    pub keyframe: bool,
}

impl EncodedSample {
    /// Size of the encoded payload in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for EncodedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedSample")
            .field("pts", &self.pts)
            .field("keyframe", &self.keyframe)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dimensions() {
        let frame = VideoFrame::new(RgbaImage::new(320, 240), 0.5);
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.pts, 0.5);
    }

    #[test]
    fn test_sample_size() {
        let sample = EncodedSample {
            data: Bytes::from_static(&[0, 0, 0, 1, 0x65]),
            pts: 0.0,
            keyframe: true,
        };
        assert_eq!(sample.size(), 5);
    }
}
