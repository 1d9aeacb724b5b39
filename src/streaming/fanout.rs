//! Fan-out of encoded samples to independent live destinations.

use super::destination::{DestinationConnector, DestinationContext, StreamProfile};
use crate::config::RenderSettings;
use crate::errors::ReelResult;
use crate::types::EncodedSample;
use futures::future::join_all;
use log::{info, warn};
use std::sync::Arc;

/// Multiplexes encoded media to all configured live destinations with
/// per-destination failure isolation.
pub struct StreamingFanout {
    settings: RenderSettings,
    connector: Arc<dyn DestinationConnector>,
    contexts: Vec<DestinationContext>,
    streaming: bool,
    appended: u64,
}

impl StreamingFanout {
    pub fn new(settings: RenderSettings, connector: Arc<dyn DestinationConnector>) -> Self {
        Self {
            settings,
            connector,
            contexts: Vec::new(),
            streaming: false,
            appended: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Number of destinations currently accepting samples.
    pub fn healthy_destinations(&self) -> usize {
        self.contexts.iter().filter(|c| c.healthy).count()
    }

    /// Number of samples accepted while streaming was active.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Establish one connection and stream per configured destination.
    ///
    /// No-op when already streaming or when no destinations are
    /// configured. Profile resolution is all-or-nothing: any failure
    /// rolls the whole start back before a single connection is
    /// attempted. Connect/publish failures after that point are
    /// per-destination: logged, that destination marked unhealthy, the
    /// rest unaffected.
    pub async fn start(&mut self) -> ReelResult<()> {
        if self.streaming || self.settings.livestream.is_empty() {
            return Ok(());
        }

        let mut contexts = Vec::with_capacity(self.settings.livestream.len());
        for dest in &self.settings.livestream {
            match StreamProfile::resolve(&self.settings, dest) {
                Ok(profile) => contexts.push(DestinationContext::new(dest.clone(), profile)),
                Err(e) => {
                    warn!("stream setup failed for {}, aborting start: {e}", dest.endpoint);
                    return Err(e);
                }
            }
        }

        self.contexts = contexts;
        self.streaming = true;
        self.publish().await;
        info!(
            "streaming started: {}/{} destinations publishing",
            self.healthy_destinations(),
            self.contexts.len()
        );
        Ok(())
    }

    /// Connect and publish each destination independently.
    async fn publish(&mut self) {
        let connector = Arc::clone(&self.connector);
        let attempts = self.contexts.iter_mut().map(|ctx| {
            let connector = Arc::clone(&connector);
            async move {
                match connector.connect(&ctx.settings.endpoint).await {
                    Ok(mut connection) => {
                        match connection.publish(&ctx.settings.stream_key, &ctx.profile).await {
                            Ok(()) => {
                                info!("publishing to {} ({})", ctx.settings.endpoint, ctx.id);
                                ctx.connection = Some(connection);
                                ctx.healthy = true;
                            }
                            Err(e) => {
                                warn!("failed to publish to {}: {e}", ctx.settings.endpoint);
                                ctx.healthy = false;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("failed to connect to {}: {e}", ctx.settings.endpoint);
                        ctx.healthy = false;
                    }
                }
            }
        });
        join_all(attempts).await;
    }

    /// Forward one encoded sample to every healthy destination.
    ///
    /// Only meaningful while streaming is active; no-ops otherwise. An
    /// append failure marks only that destination unhealthy.
    pub async fn append(&mut self, sample: &EncodedSample) {
        if !self.streaming {
            return;
        }
        self.appended += 1;

        let deliveries = self
            .contexts
            .iter_mut()
            .filter(|ctx| ctx.healthy)
            .map(|ctx| async move {
                if let Some(connection) = ctx.connection.as_mut() {
                    if let Err(e) = connection.append(sample).await {
                        warn!(
                            "destination {} failed, marking unhealthy: {e}",
                            ctx.settings.endpoint
                        );
                        ctx.healthy = false;
                    }
                }
            });
        join_all(deliveries).await;
    }

    /// Stop streaming and close every destination independently.
    ///
    /// The streaming flag clears first so no further samples are
    /// accepted during teardown. Idempotent.
    pub async fn stop(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;

        let mut contexts = std::mem::take(&mut self.contexts);
        let closes = contexts.iter_mut().map(|ctx| async move {
            if let Some(mut connection) = ctx.connection.take() {
                if let Err(e) = connection.close().await {
                    warn!("failed to close {}: {e}", ctx.settings.endpoint);
                }
            }
        });
        join_all(closes).await;
        info!("streaming stopped");
    }
}
