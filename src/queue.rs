//! Bounded FIFO frame queue between capture and encoding.
//!
//! Decouples the capture cadence (which may briefly block on rendering
//! latency) from the encoding cadence (which may briefly block on
//! encoder readiness) while guaranteeing no loss and no reordering of
//! buffered frames.

use crate::types::VideoFrame;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Single-producer/single-consumer frame channel with graceful
/// drain-and-close semantics.
///
/// Frames are delivered to the consumer in exactly the order enqueued.
/// The consuming side ends only after [`FrameQueue::finish`] has been
/// called AND every previously enqueued frame has been delivered.
pub struct FrameQueue {
    tx: Option<mpsc::Sender<VideoFrame>>,
    rx: Option<mpsc::Receiver<VideoFrame>>,
    enqueued: u64,
    dropped_full: u64,
    dropped_closed: u64,
}

impl FrameQueue {
    /// Create a queue buffering at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: Some(tx),
            rx: Some(rx),
            enqueued: 0,
            dropped_full: 0,
            dropped_closed: 0,
        }
    }

    /// Non-blocking producer push.
    ///
    /// A frame arriving after [`FrameQueue::finish`] is discarded. A
    /// frame arriving while the buffer is full is discarded too - the
    /// incoming frame, never an already buffered one, so buffered frames
    /// are never lost or reordered.
    pub fn enqueue(&mut self, frame: VideoFrame) {
        let Some(tx) = &self.tx else {
            self.dropped_closed += 1;
            debug!("frame queue closed, discarding frame at {:.3}s", frame.pts);
            return;
        };
        match tx.try_send(frame) {
            Ok(()) => self.enqueued += 1,
            Err(TrySendError::Full(frame)) => {
                self.dropped_full += 1;
                warn!(
                    "frame queue full, dropping incoming frame at {:.3}s",
                    frame.pts
                );
            }
            Err(TrySendError::Closed(frame)) => {
                self.dropped_closed += 1;
                debug!("frame queue closed, discarding frame at {:.3}s", frame.pts);
            }
        }
    }

    /// Take the consuming half.
    ///
    /// The receiver yields frames in enqueue order and terminates once
    /// the queue has been finished and fully drained. The sequence is
    /// not restartable; a second call returns `None`.
    pub fn consume(&mut self) -> Option<mpsc::Receiver<VideoFrame>> {
        self.rx.take()
    }

    /// Signal that no more frames will be enqueued.
    ///
    /// Already queued frames still drain to the consumer.
    pub fn finish(&mut self) {
        self.tx.take();
    }

    /// Number of frames accepted into the queue.
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Number of frames discarded (full buffer or closed queue).
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_closed
    }
}
