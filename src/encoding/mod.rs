//! Encoding pipeline: pixel conversion, H.264 encoding, container
//! writing, and the sink worker that ties them together.

mod convert;
mod encoder;
mod sink;
mod writer;

pub use convert::rgba_to_yuv420;
pub use encoder::{EncodedUnit, H264Encoder};
pub use sink::{EncodingSink, SinkReport};
pub use writer::{ContainerStats, ContainerWriter, Mp4Writer};
