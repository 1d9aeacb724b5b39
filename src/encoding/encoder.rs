//! H.264 encoder wrapper using openh264

use super::convert::rgba_to_yuv420;
use crate::errors::{ReelError, ReelResult};
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl H264Encoder {
    /// Create a new H.264 encoder with the specified parameters
    ///
    /// Note: the openh264 crate determines dimensions from the YUVSource
    /// at encode time; fps and bitrate are hints for rate control.
    pub fn new(width: u32, height: u32, _fps: f64, _bitrate: u32) -> ReelResult<Self> {
        let encoder = Encoder::new()
            .map_err(|e| ReelError::Encoding(format!("failed to create encoder: {e}")))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
        })
    }

    /// Encode an RGBA frame to H.264.
    ///
    /// Returns the encoded NAL units as a single Annex B buffer.
    pub fn encode_rgba(&mut self, rgba: &[u8]) -> ReelResult<EncodedUnit> {
        let expected_size = (self.width * self.height * 4) as usize;
        if rgba.len() != expected_size {
            return Err(ReelError::Encoding(format!(
                "invalid frame size: expected {} bytes, got {}",
                expected_size,
                rgba.len()
            )));
        }

        let yuv = rgba_to_yuv420(rgba, self.width, self.height);
        self.encode_yuv(&yuv)
    }

    /// Encode a YUV420 planar frame to H.264.
    pub fn encode_yuv(&mut self, yuv: &[u8]) -> ReelResult<EncodedUnit> {
        let yuv_buffer =
            YUVBuffer::from_vec(yuv.to_vec(), self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| ReelError::Encoding(format!("encoding failed: {e}")))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedUnit {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    /// Get the number of frames encoded
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Force the next frame to be a keyframe
    pub fn force_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedUnit {
    /// Encoded H.264 data in Annex B format (with start codes)
    pub data: Vec<u8>,
    /// Whether this frame is a keyframe (IDR/I frame)
    pub is_keyframe: bool,
}
