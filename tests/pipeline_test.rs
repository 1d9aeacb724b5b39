//! End-to-end pipeline tests: completion signaling, persistence modes,
//! pause semantics, and destination fan-out.

use reelcast::export::ClipExporter;
use reelcast::testing::{MemoryConnector, SyntheticSource};
use reelcast::{
    LivestreamSettings, Recorder, RecorderEvent, RecordingState, ReelResult, RenderSettings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Exporter double that trims by copying, so tests do not depend on an
/// ffmpeg binary being installed.
struct CopyExporter;

impl ClipExporter for CopyExporter {
    fn export(&self, source: &Path, _duration: Duration, dest: &Path) -> ReelResult<PathBuf> {
        std::fs::copy(source, dest)?;
        Ok(dest.to_path_buf())
    }
}

fn test_settings(dir: &Path, fps: f64, secs: u64) -> RenderSettings {
    RenderSettings::new(160, 120, fps)
        .with_capture_duration(Duration::from_secs(secs))
        .with_output_dir(dir)
        .with_realtime_pacing(false)
}

async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn recording_completes_and_persists_file() {
    let dir = tempdir().expect("tempdir");
    let settings = test_settings(dir.path(), 30.0, 2)
        .with_save_video_file(true)
        .with_name("counter");
    let output_path = settings.output_path();

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)))
        .with_exporter(Arc::new(CopyExporter));
    let mut events = recorder.subscribe();

    recorder.start().expect("start should succeed");
    recorder.completed().await;

    // late awaiters still observe completion, promptly
    tokio::time::timeout(Duration::from_millis(100), recorder.completed())
        .await
        .expect("completion must be replay-safe");

    assert_eq!(recorder.state(), RecordingState::Finished);

    let outcome = recorder.outcome().expect("outcome after completion");
    assert_eq!(outcome.frames_captured, 60, "floor(2s * 30fps) frames");
    assert_eq!(outcome.final_path.as_deref(), Some(output_path.as_path()));
    assert!(output_path.exists(), "output file should exist");
    assert!(outcome.frames_written > 0);

    // the completion signal fired exactly once
    let mut stopped = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RecorderEvent::Stopped) {
            stopped += 1;
        }
    }
    assert_eq!(stopped, 1);
}

#[tokio::test]
async fn non_persisted_recording_exposes_artifact_and_payload() {
    let dir = tempdir().expect("tempdir");
    let settings = test_settings(dir.path(), 24.0, 1).with_save_video_file(false);

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)));
    recorder.start().expect("start should succeed");
    recorder.completed().await;

    let outcome = recorder.outcome().expect("outcome after completion");
    assert_eq!(outcome.frames_captured, 24, "floor(1s * 24fps) frames");
    assert!(outcome.final_path.is_none());
    assert!(
        outcome.artifact_path.exists(),
        "temporary artifact location should be valid"
    );
    let payload = outcome.rendered_data.expect("in-memory encoded payload");
    assert!(!payload.is_empty(), "encoded payload should not be empty");
}

#[tokio::test]
async fn failed_destination_does_not_block_the_others() {
    let dir = tempdir().expect("tempdir");
    let connector = Arc::new(MemoryConnector::new());
    connector.fail_endpoint("rtmp://down.example/live");

    let settings = test_settings(dir.path(), 24.0, 1).with_livestream(vec![
        LivestreamSettings::new("rtmp://one.example/live", "key-one"),
        LivestreamSettings::new("rtmp://down.example/live", "key-down"),
        LivestreamSettings::new("rtmp://two.example/live", "key-two"),
    ]);

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)))
        .with_connector(connector.clone());
    recorder.start().expect("start should succeed");
    recorder.completed().await;

    let outcome = recorder.outcome().expect("outcome after completion");
    assert!(outcome.streamed_samples > 0);

    let one = connector.samples_for("rtmp://one.example/live");
    let two = connector.samples_for("rtmp://two.example/live");
    assert_eq!(one.len() as u64, outcome.streamed_samples);
    assert_eq!(two.len() as u64, outcome.streamed_samples);
    assert!(connector.samples_for("rtmp://down.example/live").is_empty());

    // delivered in order on every healthy destination
    for samples in [&one, &two] {
        for window in samples.windows(2) {
            assert!(window[0].pts < window[1].pts);
        }
    }
}

#[tokio::test]
async fn pause_freezes_frames_and_virtual_time() {
    let dir = tempdir().expect("tempdir");
    // open-ended session, real pacing so the loop ticks at frame rate
    let settings = RenderSettings::new(160, 120, 50.0).with_output_dir(dir.path());
    let interval = settings.frame_interval();

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)));
    recorder.start().expect("start should succeed");

    wait_for(|| recorder.frame_count() >= 2, "first frames").await;
    recorder.pause();
    assert_eq!(recorder.state(), RecordingState::Paused);

    // let any in-flight tick drain, then sample the frozen counters
    tokio::time::sleep(interval * 3).await;
    let frames = recorder.frame_count();
    let elapsed = recorder.elapsed();

    tokio::time::sleep(interval * 6).await;
    assert_eq!(recorder.frame_count(), frames, "no frames while paused");
    assert_eq!(recorder.elapsed(), elapsed, "virtual time frozen while paused");

    recorder.resume();
    assert_eq!(recorder.state(), RecordingState::Recording);
    wait_for(|| recorder.frame_count() > frames, "capture to resume").await;

    recorder.stop();
    recorder.completed().await;
    assert_eq!(recorder.state(), RecordingState::Finished);
    assert!(recorder.outcome().is_some());
}

#[tokio::test]
async fn nested_pause_requires_symmetric_resume() {
    let dir = tempdir().expect("tempdir");
    let settings = RenderSettings::new(160, 120, 50.0).with_output_dir(dir.path());

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)));
    recorder.start().expect("start should succeed");

    recorder.pause();
    recorder.pause();
    assert_eq!(recorder.state(), RecordingState::Paused);
    assert_eq!(recorder.pause_depth(), 2);

    recorder.resume();
    assert_eq!(recorder.state(), RecordingState::Paused, "still nested");

    recorder.resume();
    assert_eq!(recorder.state(), RecordingState::Recording);

    // over-resuming is clamped, not a crash
    recorder.resume();
    assert_eq!(recorder.pause_depth(), 0);
    assert_eq!(recorder.state(), RecordingState::Recording);

    recorder.stop();
    recorder.completed().await;
}

#[tokio::test]
async fn start_is_only_valid_from_idle() {
    let dir = tempdir().expect("tempdir");
    let settings = test_settings(dir.path(), 30.0, 1);

    let mut recorder = Recorder::new(settings, Arc::new(SyntheticSource::new(160, 120)));
    recorder.start().expect("first start should succeed");
    assert!(recorder.start().is_err(), "second start must be rejected");
    recorder.completed().await;
}
