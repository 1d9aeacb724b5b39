//! Testing utilities: synthetic frame sources and in-memory
//! destinations.
//!
//! These are real implementations of the pipeline's collaborator seams,
//! usable from integration tests and from downstream applications that
//! need deterministic, hardware-free runs.

use crate::errors::{ReelError, ReelResult};
use crate::render::FrameSource;
use crate::streaming::{DestinationConnection, DestinationConnector, StreamProfile};
use crate::types::EncodedSample;
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Frame source producing a deterministic gradient that changes with the
/// presentation timestamp, so the temporal encoder sees real motion.
pub struct SyntheticSource {
    width: u32,
    height: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for SyntheticSource {
    fn produce_frame(&self, pts: f64) -> ReelResult<RgbaImage> {
        let base = ((pts * 255.0) as u64 % 256) as u8;
        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            image::Rgba([
                base.wrapping_add((x % 256) as u8),
                base.wrapping_add((y % 256) as u8),
                base.wrapping_add(((x + y) % 256) as u8),
                255,
            ])
        }))
    }
}

/// Connector keeping delivered samples in memory, keyed by endpoint.
///
/// Endpoints can be marked as failing to exercise the fan-out's
/// per-destination isolation.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    delivered: Arc<Mutex<HashMap<String, Vec<EncodedSample>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future connects to `endpoint` fail.
    pub fn fail_endpoint(&self, endpoint: &str) {
        self.failing
            .lock()
            .expect("connector lock poisoned")
            .insert(endpoint.to_string());
    }

    /// Samples delivered to `endpoint` so far.
    pub fn samples_for(&self, endpoint: &str) -> Vec<EncodedSample> {
        self.delivered
            .lock()
            .expect("connector lock poisoned")
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    /// Endpoints that have received a publish.
    pub fn endpoints(&self) -> Vec<String> {
        self.delivered
            .lock()
            .expect("connector lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DestinationConnector for MemoryConnector {
    async fn connect(&self, endpoint: &str) -> ReelResult<Box<dyn DestinationConnection>> {
        if self
            .failing
            .lock()
            .expect("connector lock poisoned")
            .contains(endpoint)
        {
            return Err(ReelError::Destination(format!(
                "connection refused: {endpoint}"
            )));
        }
        Ok(Box::new(MemoryConnection {
            endpoint: endpoint.to_string(),
            delivered: Arc::clone(&self.delivered),
            published: false,
        }))
    }
}

struct MemoryConnection {
    endpoint: String,
    delivered: Arc<Mutex<HashMap<String, Vec<EncodedSample>>>>,
    published: bool,
}

#[async_trait]
impl DestinationConnection for MemoryConnection {
    async fn publish(&mut self, _stream_key: &str, _profile: &StreamProfile) -> ReelResult<()> {
        self.delivered
            .lock()
            .expect("connector lock poisoned")
            .entry(self.endpoint.clone())
            .or_default();
        self.published = true;
        Ok(())
    }

    async fn append(&mut self, sample: &EncodedSample) -> ReelResult<()> {
        if !self.published {
            return Err(ReelError::Destination(format!(
                "{}: stream not published",
                self.endpoint
            )));
        }
        self.delivered
            .lock()
            .expect("connector lock poisoned")
            .entry(self.endpoint.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn close(&mut self) -> ReelResult<()> {
        self.published = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_synthetic_frames_have_requested_size() {
        let source = SyntheticSource::new(320, 240);
        let frame = source.produce_frame(0.0).expect("frame");
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
    }

    #[test]
    fn test_synthetic_frames_differ_over_time() {
        let source = SyntheticSource::new(64, 64);
        let first = source.produce_frame(0.0).expect("frame");
        let later = source.produce_frame(0.5).expect("frame");
        assert_ne!(first.as_raw(), later.as_raw());
    }

    #[tokio::test]
    async fn test_memory_connector_records_samples() {
        let connector = MemoryConnector::new();
        let mut connection = connector
            .connect("rtmp://a.example/live")
            .await
            .expect("connect");

        let settings = crate::RenderSettings::new(320, 240, 30.0);
        let dest = crate::LivestreamSettings::new("rtmp://a.example/live", "key");
        let profile = StreamProfile::resolve(&settings, &dest).expect("profile");

        connection.publish("key", &profile).await.expect("publish");
        connection
            .append(&EncodedSample {
                data: Bytes::from_static(&[1, 2, 3]),
                pts: 0.0,
                keyframe: true,
            })
            .await
            .expect("append");

        assert_eq!(connector.samples_for("rtmp://a.example/live").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_endpoint_refuses_connects() {
        let connector = MemoryConnector::new();
        connector.fail_endpoint("rtmp://down.example/live");
        assert!(connector.connect("rtmp://down.example/live").await.is_err());
    }
}
