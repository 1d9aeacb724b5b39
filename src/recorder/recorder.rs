//! Top-level recording controller and capture loop.

use crate::audio::{AudioMixer, TrackedAudioMixer};
use crate::config::RenderSettings;
use crate::encoding::{ContainerWriter, EncodingSink, Mp4Writer, SinkReport};
use crate::errors::{ReelError, ReelResult};
use crate::export::{ClipExporter, FfmpegExporter};
use crate::queue::FrameQueue;
use crate::recorder::state::RecordingState;
use crate::render::FrameSource;
use crate::streaming::{DestinationConnector, StreamingFanout};
use crate::timing::{FrameTimer, VirtualClock};
use crate::types::{EncodedSample, VideoFrame};
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Events broadcast while a recording session runs.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Capture started
    Started,
    /// Capture paused
    Paused,
    /// Capture resumed
    Resumed,
    /// Virtual seconds captured so far
    Progress(f64),
    /// Session finished and output finalized
    Stopped,
    /// Error occurred (session continues in degraded mode)
    Error(String),
}

/// Summary of a completed recording.
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    /// Where the captured media ended up: the final output path on
    /// success, or the temporary artifact when persistence was off or
    /// the move/export failed.
    pub artifact_path: PathBuf,
    /// The configured output path, when the artifact reached it.
    pub final_path: Option<PathBuf>,
    /// Frames produced by the capture loop.
    pub frames_captured: u64,
    /// Frames appended to the container file.
    pub frames_written: u64,
    /// Frames dropped for file output under writer backpressure.
    pub backpressure_drops: u64,
    /// Frames dropped at the capture queue.
    pub queue_drops: u64,
    /// Total encoded payload in bytes.
    pub bytes_encoded: u64,
    /// Samples accepted by the streaming fan-out.
    pub streamed_samples: u64,
    /// Encoded payload kept in memory when file persistence is off.
    pub rendered_data: Option<Bytes>,
    /// Virtual seconds captured.
    pub duration_secs: f64,
}

struct ControlBlock {
    state: RecordingState,
    pause_depth: i32,
}

struct FanoutSummary {
    appended: u64,
}

/// Top-level state machine driving capture, encoding, and streaming.
///
/// Owns the virtual clock, the frame queue, the encoding sink, and the
/// streaming fan-out. All session state lives behind one lock and is
/// mutated only through the methods here; sub-components refer back to
/// the session by id, never by owning pointer.
pub struct Recorder {
    settings: RenderSettings,
    session_id: Uuid,
    source: Arc<dyn FrameSource>,
    audio: Arc<dyn AudioMixer>,
    exporter: Arc<dyn ClipExporter>,
    connector: Option<Arc<dyn DestinationConnector>>,
    control: Arc<Mutex<ControlBlock>>,
    clock: VirtualClock,
    frames_captured: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    event_tx: broadcast::Sender<RecorderEvent>,
    completion_tx: watch::Sender<bool>,
    outcome: Arc<Mutex<Option<RecordingOutcome>>>,
}

impl Recorder {
    /// Create a recorder filming frames from `source`.
    pub fn new(settings: RenderSettings, source: Arc<dyn FrameSource>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (completion_tx, _) = watch::channel(false);
        Self {
            settings,
            session_id: Uuid::new_v4(),
            source,
            audio: Arc::new(TrackedAudioMixer::new()),
            exporter: Arc::new(FfmpegExporter::new()),
            connector: None,
            control: Arc::new(Mutex::new(ControlBlock {
                state: RecordingState::Idle,
                pause_depth: 0,
            })),
            clock: VirtualClock::new(),
            frames_captured: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
            event_tx,
            completion_tx,
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the audio collaborator.
    pub fn with_audio_mixer(mut self, mixer: Arc<dyn AudioMixer>) -> Self {
        self.audio = mixer;
        self
    }

    /// Replace the export collaborator.
    pub fn with_exporter(mut self, exporter: Arc<dyn ClipExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Set the transport used to reach live destinations.
    pub fn with_connector(mut self, connector: Arc<dyn DestinationConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current session state.
    pub fn state(&self) -> RecordingState {
        self.control.lock().expect("control lock poisoned").state
    }

    /// Current pause nesting depth.
    pub fn pause_depth(&self) -> i32 {
        self.control
            .lock()
            .expect("control lock poisoned")
            .pause_depth
    }

    /// Frames captured so far.
    pub fn frame_count(&self) -> u64 {
        self.frames_captured.load(Ordering::SeqCst)
    }

    /// Virtual time captured so far.
    pub fn elapsed(&self) -> std::time::Duration {
        self.clock.elapsed()
    }

    /// A handle to the session's virtual clock.
    pub fn clock(&self) -> VirtualClock {
        self.clock.clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Summary of the finished recording, once completion has fired.
    pub fn outcome(&self) -> Option<RecordingOutcome> {
        self.outcome.lock().expect("outcome lock poisoned").clone()
    }

    /// Start recording. Only valid from Idle.
    ///
    /// Must be called from within a tokio runtime; the capture loop, the
    /// sink worker, and the streaming pump are spawned here.
    pub fn start(&mut self) -> ReelResult<()> {
        self.settings.validate()?;
        std::fs::create_dir_all(&self.settings.output_dir)?;

        {
            let mut control = self.control.lock().expect("control lock poisoned");
            if control.state != RecordingState::Idle {
                return Err(ReelError::Setup(format!(
                    "cannot start recording from state {}",
                    control.state
                )));
            }
            control.state = RecordingState::Recording;
            control.pause_depth = 0;
        }

        self.clock.reset();
        self.frames_captured.store(0, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);

        if self.settings.audio_enabled {
            if let Err(e) = self.audio.setup() {
                warn!("audio setup failed, continuing without audio: {e}");
            }
        }

        let temp_path = self.settings.temp_output_path();
        let writer = self.setup_writer(&temp_path);

        let mut queue = FrameQueue::new(self.settings.queue_capacity);
        let frame_rx = queue.consume().expect("fresh queue has a receiver");

        let (sample_tx, pump_task) = self.spawn_streaming();

        let sink = EncodingSink::new(self.settings.clone(), writer, sample_tx);
        let sink_task = tokio::task::spawn_blocking(move || sink.run(frame_rx));

        let ctx = CaptureContext {
            settings: self.settings.clone(),
            session_id: self.session_id,
            source: Arc::clone(&self.source),
            audio: Arc::clone(&self.audio),
            exporter: Arc::clone(&self.exporter),
            control: Arc::clone(&self.control),
            clock: self.clock.clone(),
            frames_captured: Arc::clone(&self.frames_captured),
            cancelled: Arc::clone(&self.cancelled),
            event_tx: self.event_tx.clone(),
            completion_tx: self.completion_tx.clone(),
            outcome: Arc::clone(&self.outcome),
            queue,
            sink_task,
            pump_task,
            temp_path,
        };
        tokio::spawn(capture_loop(ctx));

        let _ = self.event_tx.send(RecorderEvent::Started);
        info!("recording session {} started", self.session_id);
        Ok(())
    }

    /// Build the container writer, or degrade to no-file mode.
    fn setup_writer(&self, temp_path: &Path) -> Option<Box<dyn ContainerWriter>> {
        if self.settings.save_video_file {
            match Mp4Writer::create(temp_path, &self.settings) {
                Ok(writer) => Some(Box::new(writer)),
                Err(e) => {
                    error!("writer setup failed, continuing without file output: {e}");
                    let _ = self.event_tx.send(RecorderEvent::Error(e.to_string()));
                    None
                }
            }
        } else {
            // keep a valid temporary artifact location even when the
            // recording is not persisted
            if let Err(e) = std::fs::File::create(temp_path) {
                warn!("failed to create temporary artifact {temp_path:?}: {e}");
            }
            None
        }
    }

    /// Spawn the fan-out pump when destinations are configured.
    fn spawn_streaming(
        &self,
    ) -> (
        Option<mpsc::Sender<EncodedSample>>,
        Option<JoinHandle<FanoutSummary>>,
    ) {
        if self.settings.livestream.is_empty() {
            return (None, None);
        }
        let Some(connector) = self.connector.clone() else {
            warn!("live destinations configured but no destination connector set; streaming disabled");
            return (None, None);
        };

        let (sample_tx, mut sample_rx) = mpsc::channel::<EncodedSample>(32);
        let mut fanout = StreamingFanout::new(self.settings.clone(), connector);
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = fanout.start().await {
                error!("failed to start live streaming: {e}");
                let _ = event_tx.send(RecorderEvent::Error(e.to_string()));
            }
            while let Some(sample) = sample_rx.recv().await {
                fanout.append(&sample).await;
            }
            fanout.stop().await;
            FanoutSummary {
                appended: fanout.appended(),
            }
        });
        (Some(sample_tx), Some(handle))
    }

    /// Increase the pause depth; the first pause while Recording
    /// suspends capture and audio.
    pub fn pause(&self) {
        let entered_pause = {
            let mut control = self.control.lock().expect("control lock poisoned");
            control.pause_depth += 1;
            if control.state == RecordingState::Recording {
                control.state = RecordingState::Paused;
                true
            } else {
                false
            }
        };
        if entered_pause {
            self.audio.pause_all();
            let _ = self.event_tx.send(RecorderEvent::Paused);
            info!("recording paused");
        }
    }

    /// Decrease the pause depth; capture resumes when it returns to
    /// zero. Resuming more than pausing is clamped and logged, never a
    /// panic.
    pub fn resume(&self) {
        let left_pause = {
            let mut control = self.control.lock().expect("control lock poisoned");
            if control.pause_depth == 0 {
                warn!("resume called more times than pause; ignoring");
                return;
            }
            control.pause_depth -= 1;
            if control.pause_depth == 0 && control.state == RecordingState::Paused {
                control.state = RecordingState::Recording;
                true
            } else {
                false
            }
        };
        if left_pause {
            self.audio.resume_all();
            let _ = self.event_tx.send(RecorderEvent::Resumed);
            info!("recording resumed");
        }
    }

    /// Stop the session. Valid from Recording or Paused; the capture
    /// loop observes Finished on its next check and finalizes output.
    pub fn stop(&self) {
        let stopped = {
            let mut control = self.control.lock().expect("control lock poisoned");
            if control.state.is_active() {
                control.state = RecordingState::Finished;
                true
            } else {
                false
            }
        };
        if stopped {
            self.audio.stop();
            info!("recording stopped");
        }
    }

    /// Cooperatively cancel the capture loop. In-flight encoding and
    /// publishing complete; output is still finalized.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Wait until the session has finished and output is finalized.
    ///
    /// Replay-safe: awaiting after completion returns immediately.
    pub async fn completed(&self) {
        let mut rx = self.completion_tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Load an audio source, pausing capture around the load as the
    /// mixer may block.
    pub fn load_audio(&self, source: &Path) -> ReelResult<()> {
        self.pause();
        let result = self.audio.load(source);
        self.resume();
        result
    }

    pub fn play_audio(&self, source: &Path) {
        self.audio.play(source);
    }

    pub fn pause_audio(&self, source: &Path) {
        self.audio.pause(source);
    }

    pub fn resume_audio(&self, source: &Path) {
        self.audio.resume(source);
    }

    pub fn stop_audio(&self, source: &Path) {
        self.audio.stop_source(source);
    }
}

/// Everything the capture loop task owns.
struct CaptureContext {
    settings: RenderSettings,
    session_id: Uuid,
    source: Arc<dyn FrameSource>,
    audio: Arc<dyn AudioMixer>,
    exporter: Arc<dyn ClipExporter>,
    control: Arc<Mutex<ControlBlock>>,
    clock: VirtualClock,
    frames_captured: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    event_tx: broadcast::Sender<RecorderEvent>,
    completion_tx: watch::Sender<bool>,
    outcome: Arc<Mutex<Option<RecordingOutcome>>>,
    queue: FrameQueue,
    sink_task: JoinHandle<SinkReport>,
    pump_task: Option<JoinHandle<FanoutSummary>>,
    temp_path: PathBuf,
}

/// Drive frame production until the session ends, then finalize.
async fn capture_loop(mut ctx: CaptureContext) {
    let frame_interval = ctx.settings.frame_interval();
    let total_frames = ctx.settings.total_frames().unwrap_or(u64::MAX);
    let mut timer = FrameTimer::new(ctx.settings.fps);
    timer.start();

    loop {
        if ctx.cancelled.load(Ordering::SeqCst) {
            debug!("capture loop cancelled");
            break;
        }
        if timer.frame_count() >= total_frames {
            break;
        }

        let state = ctx.control.lock().expect("control lock poisoned").state;
        match state {
            RecordingState::Recording => {
                let tick_start = Instant::now();
                let pts = timer.current_frame_time();

                match ctx.source.produce_frame(pts) {
                    Ok(image) => {
                        ctx.queue.enqueue(VideoFrame::new(image, pts));
                        timer.increment_frame();
                        ctx.frames_captured
                            .store(timer.frame_count(), Ordering::SeqCst);
                        let _ = ctx.event_tx.send(RecorderEvent::Progress(pts));
                    }
                    // content not ready; retry this timestamp next tick
                    Err(e) => warn!("frame render failed at {pts:.3}s: {e}"),
                }

                ctx.clock.advance(frame_interval).await;

                if ctx.settings.realtime_pacing {
                    // sleep off whatever real time the tick has left
                    let spent = tick_start.elapsed();
                    if spent < frame_interval {
                        tokio::time::sleep(frame_interval - spent).await;
                    }
                }
            }
            RecordingState::Paused => {
                // no frames, no virtual time while paused
                tokio::time::sleep(frame_interval).await;
            }
            RecordingState::Finished | RecordingState::Idle => break,
        }
    }

    finalize(ctx, timer.frame_count()).await;
}

/// Funnel for every exit path: drain the sink, tear down streaming,
/// finalize the artifact, and fire the completion signal exactly once.
async fn finalize(ctx: CaptureContext, frames_captured: u64) {
    let CaptureContext {
        settings,
        session_id,
        audio,
        exporter,
        control,
        clock,
        event_tx,
        completion_tx,
        outcome,
        mut queue,
        sink_task,
        pump_task,
        temp_path,
        ..
    } = ctx;

    {
        let mut state = control.lock().expect("control lock poisoned");
        state.state = RecordingState::Finished;
    }
    audio.stop();

    let queue_drops = queue.dropped();
    queue.finish();

    let report = match sink_task.await {
        Ok(report) => report,
        Err(e) => {
            error!("encoding sink worker failed: {e}");
            SinkReport::default()
        }
    };
    if let Some(e) = &report.error {
        let _ = event_tx.send(RecorderEvent::Error(e.clone()));
    }

    // the sink dropped its sample sender, so the pump drains and stops
    let streamed_samples = match pump_task {
        Some(handle) => match handle.await {
            Ok(summary) => summary.appended,
            Err(e) => {
                error!("streaming pump failed: {e}");
                0
            }
        },
        None => 0,
    };

    let (artifact_path, final_path) =
        finalize_artifact(&settings, &exporter, &event_tx, temp_path, &report).await;

    let summary = RecordingOutcome {
        artifact_path,
        final_path,
        frames_captured,
        frames_written: report.frames_written,
        backpressure_drops: report.backpressure_drops,
        queue_drops,
        bytes_encoded: report.bytes_encoded,
        streamed_samples,
        rendered_data: report.rendered_data,
        duration_secs: clock.elapsed().as_secs_f64(),
    };
    *outcome.lock().expect("outcome lock poisoned") = Some(summary);

    let _ = event_tx.send(RecorderEvent::Stopped);
    completion_tx.send_replace(true);
    info!("recording session {session_id} finished after {frames_captured} frames");
}

/// Move or export the temporary artifact to its final location.
///
/// On any failure the temporary file stays in place; a partial or
/// corrupt file never appears at the configured output path.
async fn finalize_artifact(
    settings: &RenderSettings,
    exporter: &Arc<dyn ClipExporter>,
    event_tx: &broadcast::Sender<RecorderEvent>,
    temp: PathBuf,
    report: &SinkReport,
) -> (PathBuf, Option<PathBuf>) {
    if !settings.save_video_file || report.container.is_none() {
        return (temp, None);
    }

    let output = settings.output_path();
    if let Some(duration) = settings.capture_duration {
        let exporter = Arc::clone(exporter);
        let source = temp.clone();
        let dest = output.clone();
        let exported =
            tokio::task::spawn_blocking(move || exporter.export(&source, duration, &dest)).await;

        match exported {
            Ok(Ok(path)) => {
                if let Err(e) = std::fs::remove_file(&temp) {
                    warn!("failed to remove temporary artifact {temp:?}: {e}");
                }
                (path.clone(), Some(path))
            }
            Ok(Err(e)) => {
                error!("export failed, keeping untrimmed artifact {temp:?}: {e}");
                let _ = event_tx.send(RecorderEvent::Error(e.to_string()));
                (temp, None)
            }
            Err(e) => {
                error!("export task failed, keeping untrimmed artifact {temp:?}: {e}");
                (temp, None)
            }
        }
    } else {
        match std::fs::rename(&temp, &output) {
            Ok(()) => (output.clone(), Some(output)),
            Err(e) => {
                error!("failed to move artifact into place, keeping {temp:?}: {e}");
                let _ = event_tx.send(RecorderEvent::Error(e.to_string()));
                (temp, None)
            }
        }
    }
}
