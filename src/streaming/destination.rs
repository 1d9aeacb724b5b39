//! Live-destination connections and per-destination state.

use crate::config::{H264Profile, LivestreamSettings, RenderSettings};
use crate::errors::{ReelError, ReelResult};
use crate::types::EncodedSample;
use async_trait::async_trait;
use uuid::Uuid;

/// Resolved encoding profile for one destination stream.
///
/// Per-destination overrides are applied against the session defaults
/// when streaming starts; a destination with no overrides inherits the
/// session bitrate and the High profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProfile {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: u32,
    pub profile: H264Profile,
    pub keyframe_interval: u32,
}

impl StreamProfile {
    /// Resolve the profile for `dest` against the session settings.
    pub fn resolve(settings: &RenderSettings, dest: &LivestreamSettings) -> ReelResult<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(ReelError::Setup("stream dimensions must be non-zero".into()));
        }
        let bitrate = dest.bitrate.unwrap_or_else(|| settings.default_bitrate());
        if bitrate == 0 {
            return Err(ReelError::Setup(format!(
                "destination {} requested a zero bitrate",
                dest.endpoint
            )));
        }

        Ok(Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            bitrate,
            profile: dest.profile.unwrap_or(H264Profile::High),
            keyframe_interval: settings.keyframe_interval(),
        })
    }
}

/// Establishes transport connections to live endpoints.
///
/// The wire protocol itself is out of scope for this crate;
/// applications plug in a connector for their ingest protocol, and
/// tests use [`crate::testing::MemoryConnector`].
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// Open a connection to the given endpoint URL.
    async fn connect(&self, endpoint: &str) -> ReelResult<Box<dyn DestinationConnection>>;
}

/// One open connection to a live endpoint.
#[async_trait]
pub trait DestinationConnection: Send {
    /// Start a named stream on this connection.
    async fn publish(&mut self, stream_key: &str, profile: &StreamProfile) -> ReelResult<()>;

    /// Forward one encoded sample to the published stream.
    async fn append(&mut self, sample: &EncodedSample) -> ReelResult<()>;

    /// Close the stream and the connection.
    async fn close(&mut self) -> ReelResult<()>;
}

/// Per-destination state owned by the fan-out.
///
/// Never shared across destinations; the health flag is mutated only by
/// this destination's own connect/publish/close path.
pub struct DestinationContext {
    pub id: Uuid,
    pub settings: LivestreamSettings,
    pub profile: StreamProfile,
    pub connection: Option<Box<dyn DestinationConnection>>,
    pub healthy: bool,
}

impl DestinationContext {
    pub fn new(settings: LivestreamSettings, profile: StreamProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            profile,
            connection: None,
            healthy: false,
        }
    }
}
