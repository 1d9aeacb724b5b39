//! Property-based tests for frame timing and counting invariants.
//!
//! Run with: cargo test --test timing_props

use proptest::prelude::*;
use reelcast::timing::FrameTimer;
use reelcast::RenderSettings;
use std::time::Duration;

proptest! {
    /// INVARIANT: the frame budget for a fixed capture duration is
    /// floor(duration * fps).
    #[test]
    fn total_frames_matches_duration(
        fps in 1u32..=120,
        secs in 1u64..=30,
    ) {
        let settings = RenderSettings::new(320, 240, f64::from(fps))
            .with_capture_duration(Duration::from_secs(secs));
        prop_assert_eq!(
            settings.total_frames(),
            Some((secs as f64 * f64::from(fps)).floor() as u64)
        );
    }

    /// INVARIANT: presentation timestamps strictly increase and are
    /// spaced exactly 1/fps apart.
    #[test]
    fn frame_times_strictly_increase(
        fps in 1u32..=120,
        steps in 1usize..400,
    ) {
        let mut timer = FrameTimer::new(f64::from(fps));
        timer.start();

        let mut last = -1.0f64;
        for i in 0..steps {
            let t = timer.current_frame_time();
            prop_assert!(t > last, "timestamp {} not after {}", t, last);
            prop_assert!((t - i as f64 / f64::from(fps)).abs() < 1e-9);
            last = t;
            timer.increment_frame();
        }
    }

    /// INVARIANT: settings validation rejects odd dimensions (4:2:0
    /// encoding needs even ones) and accepts even ones.
    #[test]
    fn validation_requires_even_dimensions(
        width in 2u32..1000,
        height in 2u32..1000,
    ) {
        let settings = RenderSettings::new(width, height, 30.0);
        if width % 2 == 0 && height % 2 == 0 {
            prop_assert!(settings.validate().is_ok());
        } else {
            prop_assert!(settings.validate().is_err());
        }
    }

    /// INVARIANT: the keyframe interval is about two seconds of frames
    /// and never zero.
    #[test]
    fn keyframe_interval_positive(fps in 1u32..=240) {
        let settings = RenderSettings::new(320, 240, f64::from(fps));
        let interval = settings.keyframe_interval();
        prop_assert!(interval >= 1);
        prop_assert_eq!(interval, (f64::from(fps) * 2.0).round() as u32);
    }
}
