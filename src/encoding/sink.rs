//! Encoding sink: drains the frame queue, encodes, writes, forwards.

use super::encoder::H264Encoder;
use super::writer::{ContainerStats, ContainerWriter};
use crate::config::RenderSettings;
use crate::types::{EncodedSample, VideoFrame};
use bytes::Bytes;
use log::{debug, error, warn};
use tokio::sync::mpsc;

/// Report returned by the sink worker once the queue has drained.
#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    /// Frames consumed from the queue.
    pub frames_in: u64,
    /// Frames appended to the container file.
    pub frames_written: u64,
    /// Frames dropped for file output because the writer was not ready.
    pub backpressure_drops: u64,
    /// Total encoded payload produced, in bytes.
    pub bytes_encoded: u64,
    /// Stats from the finalized container, when one was written.
    pub container: Option<ContainerStats>,
    /// Encoded payload accumulated in memory when file persistence is
    /// disabled.
    pub rendered_data: Option<Bytes>,
    /// First fatal sink error, if any. The pipeline still finalizes.
    pub error: Option<String>,
}

/// Consumes frames in order, encodes them, writes them to the container
/// under flow control, and forwards every encoded sample downstream.
///
/// Runs on a dedicated blocking worker so CPU-bound encoding never
/// stalls the capture loop's timing beyond the queue's buffering.
pub struct EncodingSink {
    settings: RenderSettings,
    writer: Option<Box<dyn ContainerWriter>>,
    sample_tx: Option<mpsc::Sender<EncodedSample>>,
    keep_payload: bool,
}

impl EncodingSink {
    /// Create a sink.
    ///
    /// `writer` is `None` when file output is disabled or degraded;
    /// `sample_tx` is `None` when no live destinations are configured.
    pub fn new(
        settings: RenderSettings,
        writer: Option<Box<dyn ContainerWriter>>,
        sample_tx: Option<mpsc::Sender<EncodedSample>>,
    ) -> Self {
        let keep_payload = !settings.save_video_file;
        Self {
            settings,
            writer,
            sample_tx,
            keep_payload,
        }
    }

    /// Drain the queue to completion on the calling (blocking) thread.
    ///
    /// Returns once the queue has been finished and every buffered frame
    /// processed, with the container finalized.
    pub fn run(mut self, mut rx: mpsc::Receiver<VideoFrame>) -> SinkReport {
        let mut report = SinkReport::default();

        let mut encoder = match H264Encoder::new(
            self.settings.width,
            self.settings.height,
            self.settings.fps,
            self.settings.default_bitrate(),
        ) {
            Ok(encoder) => encoder,
            Err(e) => {
                error!("encoder setup failed, discarding frames: {e}");
                report.error = Some(e.to_string());
                while rx.blocking_recv().is_some() {}
                self.finalize_writer(&mut report);
                return report;
            }
        };

        let mut payload = if self.keep_payload {
            Some(Vec::new())
        } else {
            None
        };

        while let Some(frame) = rx.blocking_recv() {
            report.frames_in += 1;

            if frame.width() != self.settings.width || frame.height() != self.settings.height {
                warn!(
                    "frame at {:.3}s is {}x{}, expected {}x{}; skipping",
                    frame.pts,
                    frame.width(),
                    frame.height(),
                    self.settings.width,
                    self.settings.height
                );
                continue;
            }

            let unit = match encoder.encode_rgba(frame.image.as_raw()) {
                Ok(unit) => unit,
                Err(e) => {
                    warn!("failed to encode frame at {:.3}s: {e}", frame.pts);
                    if report.error.is_none() {
                        report.error = Some(e.to_string());
                    }
                    continue;
                }
            };
            if unit.data.is_empty() {
                debug!("encoder produced no data for frame at {:.3}s", frame.pts);
                continue;
            }

            let sample = EncodedSample {
                data: Bytes::from(unit.data),
                pts: frame.pts,
                keyframe: unit.is_keyframe,
            };

            if self.settings.save_video_file {
                if let Some(writer) = self.writer.as_mut() {
                    if writer.is_ready() {
                        match writer.append_video(sample.pts, &sample.data, sample.keyframe) {
                            Ok(()) => report.frames_written += 1,
                            Err(e) => {
                                // file output stops here; streaming continues
                                error!("container write failed at {:.3}s: {e}", sample.pts);
                                report.error = Some(e.to_string());
                                self.writer = None;
                            }
                        }
                    } else {
                        report.backpressure_drops += 1;
                        debug!(
                            "writer not ready, dropping frame at {:.3}s for file output",
                            sample.pts
                        );
                    }
                }
            }

            report.bytes_encoded += sample.size() as u64;
            if let Some(buf) = payload.as_mut() {
                buf.extend_from_slice(&sample.data);
            }

            // forwarded regardless of the file-write outcome
            if let Some(tx) = &self.sample_tx {
                if tx.blocking_send(sample).is_err() {
                    debug!("sample channel closed, stopping forwarding");
                    self.sample_tx = None;
                }
            }
        }

        self.finalize_writer(&mut report);
        report.rendered_data = payload.map(Bytes::from);
        report
    }

    fn finalize_writer(&mut self, report: &mut SinkReport) {
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(stats) => report.container = Some(stats),
                Err(e) => {
                    error!("failed to finalize container: {e}");
                    if report.error.is_none() {
                        report.error = Some(e.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReelResult;
    use image::RgbaImage;

    /// Writer stub accepting a fixed number of samples before reporting
    /// not-ready.
    struct LimitedWriter {
        accept: usize,
        appended: Vec<f64>,
    }

    impl ContainerWriter for LimitedWriter {
        fn is_ready(&self) -> bool {
            self.appended.len() < self.accept
        }

        fn append_video(&mut self, pts: f64, _data: &[u8], _keyframe: bool) -> ReelResult<()> {
            self.appended.push(pts);
            Ok(())
        }

        fn finalize(self: Box<Self>) -> ReelResult<ContainerStats> {
            Ok(ContainerStats {
                frames_written: self.appended.len() as u64,
                duration_secs: self.appended.last().copied().unwrap_or(0.0),
                bytes_written: 0,
            })
        }
    }

    fn settings() -> RenderSettings {
        RenderSettings::new(64, 64, 30.0).with_save_video_file(true)
    }

    fn push_frames(tx: &mpsc::Sender<VideoFrame>, count: usize) {
        for i in 0..count {
            let pts = i as f64 / 30.0;
            let shade = (i * 40 % 256) as u8;
            let image = RgbaImage::from_pixel(64, 64, image::Rgba([shade, shade, shade, 255]));
            tx.try_send(VideoFrame::new(image, pts))
                .expect("queue should accept test frames");
        }
    }

    #[test]
    fn test_sink_drains_queue_in_order() {
        let (tx, rx) = mpsc::channel(32);
        push_frames(&tx, 10);
        drop(tx);

        let writer = Box::new(LimitedWriter {
            accept: usize::MAX,
            appended: Vec::new(),
        });
        let sink = EncodingSink::new(settings(), Some(writer), None);
        let report = sink.run(rx);

        assert_eq!(report.frames_in, 10);
        assert_eq!(report.backpressure_drops, 0);
        let stats = report.container.expect("container should finalize");
        assert_eq!(stats.frames_written, report.frames_written);
    }

    #[test]
    fn test_backpressure_drops_file_frames_but_streams_all() {
        let (tx, rx) = mpsc::channel(32);
        push_frames(&tx, 8);
        drop(tx);

        let (sample_tx, mut sample_rx) = mpsc::channel(64);
        let writer = Box::new(LimitedWriter {
            accept: 3,
            appended: Vec::new(),
        });
        let sink = EncodingSink::new(settings(), Some(writer), Some(sample_tx));
        let report = sink.run(rx);

        assert_eq!(report.frames_written, 3);
        assert_eq!(report.backpressure_drops + report.frames_written, 8);

        // every encoded sample still reached the streaming side
        let mut streamed = 0;
        while sample_rx.try_recv().is_ok() {
            streamed += 1;
        }
        assert_eq!(streamed, 8);
    }

    #[test]
    fn test_no_persistence_accumulates_payload() {
        let (tx, rx) = mpsc::channel(32);
        push_frames(&tx, 5);
        drop(tx);

        let sink = EncodingSink::new(
            RenderSettings::new(64, 64, 30.0).with_save_video_file(false),
            None,
            None,
        );
        let report = sink.run(rx);

        assert_eq!(report.frames_in, 5);
        let data = report.rendered_data.expect("payload should be kept");
        assert!(!data.is_empty());
        assert_eq!(data.len() as u64, report.bytes_encoded);
    }
}
