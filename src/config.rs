//! Render settings and live-destination configuration.
//!
//! `RenderSettings` is created once at pipeline construction and
//! read-only thereafter. Settings can round-trip through TOML for
//! applications that configure recordings from files.

use crate::errors::{ReelError, ReelResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quality presets for recorded and streamed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingQuality {
    /// 720p, lower bitrate - good for previews/streaming
    Low,
    /// 1080p, standard bitrate - balanced quality
    Medium,
    /// 1080p, high bitrate
    High,
    /// Custom settings; bitrate derived from dimensions and frame rate
    Custom,
}

impl RecordingQuality {
    /// Get recommended bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 2_500_000,
            RecordingQuality::Medium => 5_000_000,
            RecordingQuality::High => 10_000_000,
            RecordingQuality::Custom => 5_000_000,
        }
    }

    /// Get recommended resolution (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            RecordingQuality::Low => (1280, 720),
            RecordingQuality::Medium => (1920, 1080),
            RecordingQuality::High => (1920, 1080),
            RecordingQuality::Custom => (1920, 1080),
        }
    }

    /// Get recommended framerate
    pub fn fps(&self) -> f64 {
        30.0
    }
}

impl Default for RecordingQuality {
    fn default() -> Self {
        RecordingQuality::High
    }
}

/// H.264 profile requested for a live destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum H264Profile {
    Baseline,
    Main,
    High,
}

impl H264Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            H264Profile::Baseline => "baseline",
            H264Profile::Main => "main",
            H264Profile::High => "high",
        }
    }
}

/// A single live-streaming destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivestreamSettings {
    /// Endpoint URL the connector dials (e.g. an RTMP ingest URL).
    pub endpoint: String,
    /// Stream key published on the connection.
    pub stream_key: String,
    /// Per-destination bitrate override in bits per second.
    pub bitrate: Option<u32>,
    /// Per-destination H.264 profile override.
    pub profile: Option<H264Profile>,
}

impl LivestreamSettings {
    pub fn new(endpoint: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            stream_key: stream_key.into(),
            bitrate: None,
            profile: None,
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_profile(mut self, profile: H264Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Immutable settings for one recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Base name for output artifacts.
    pub name: String,
    /// Frame width in pixels (must be even for 4:2:0 encoding).
    pub width: u32,
    /// Frame height in pixels (must be even for 4:2:0 encoding).
    pub height: u32,
    /// Frames per second of virtual time.
    pub fps: f64,
    /// Display scale hint passed through to the renderer.
    pub display_scale: f32,
    /// Stop capturing once this much virtual time has been filmed.
    pub capture_duration: Option<Duration>,
    /// Whether the recording is persisted to the configured output path.
    pub save_video_file: bool,
    /// Whether the audio mixer participates in the session.
    pub audio_enabled: bool,
    /// Live destinations to broadcast to (zero or many).
    pub livestream: Vec<LivestreamSettings>,
    /// Directory holding the temporary and final artifacts.
    pub output_dir: PathBuf,
    /// Maximum frames buffered between capture and encoding.
    pub queue_capacity: usize,
    /// Whether the capture loop paces itself to real time. Disable for
    /// purely test-driven runs where only virtual time matters.
    pub realtime_pacing: bool,
    /// Quality preset used
    pub quality: RecordingQuality,
}

impl RenderSettings {
    /// Create settings with explicit dimensions and frame rate.
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            name: "recording".to_string(),
            width,
            height,
            fps,
            display_scale: 1.0,
            capture_duration: None,
            save_video_file: false,
            audio_enabled: false,
            livestream: Vec::new(),
            output_dir: std::env::temp_dir(),
            queue_capacity: 64,
            realtime_pacing: true,
            quality: RecordingQuality::Custom,
        }
    }

    /// Create settings from a quality preset.
    pub fn from_quality(quality: RecordingQuality) -> Self {
        let (width, height) = quality.resolution();
        let mut settings = Self::new(width, height, quality.fps());
        settings.quality = quality;
        settings
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capture_duration(mut self, duration: Duration) -> Self {
        self.capture_duration = Some(duration);
        self
    }

    pub fn with_save_video_file(mut self, save: bool) -> Self {
        self.save_video_file = save;
        self
    }

    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }

    pub fn with_livestream(mut self, destinations: Vec<LivestreamSettings>) -> Self {
        self.livestream = destinations;
        self
    }

    pub fn add_livestream(mut self, destination: LivestreamSettings) -> Self {
        self.livestream.push(destination);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_display_scale(mut self, scale: f32) -> Self {
        self.display_scale = scale;
        self
    }

    pub fn with_realtime_pacing(mut self, pacing: bool) -> Self {
        self.realtime_pacing = pacing;
        self
    }

    /// Bitrate for the session: the preset value, or a pixel-rate
    /// heuristic for custom dimensions.
    pub fn default_bitrate(&self) -> u32 {
        match self.quality {
            RecordingQuality::Custom => {
                let pixel_rate = f64::from(self.width) * f64::from(self.height) * self.fps;
                (pixel_rate * 0.1).clamp(1_000_000.0, 25_000_000.0) as u32
            }
            preset => preset.bitrate(),
        }
    }

    /// Keyframe interval in frames (one IDR every two seconds).
    pub fn keyframe_interval(&self) -> u32 {
        (self.fps * 2.0).round().max(1.0) as u32
    }

    /// Duration of one frame of virtual time.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Total frame budget, when a capture duration is configured.
    pub fn total_frames(&self) -> Option<u64> {
        self.capture_duration
            .map(|d| (d.as_secs_f64() * self.fps).floor() as u64)
    }

    /// Final output path for the persisted recording.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", self.name))
    }

    /// A fresh timestamped path for the temporary capture artifact.
    pub fn temp_output_path(&self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        self.output_dir
            .join(format!("{}-{}.tmp.mp4", self.name, stamp))
    }

    /// Validate configuration values
    pub fn validate(&self) -> ReelResult<()> {
        if self.name.is_empty() {
            return Err(ReelError::InvalidConfig("name must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::InvalidConfig("invalid frame dimensions".into()));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ReelError::InvalidConfig(
                "frame dimensions must be even for 4:2:0 encoding".into(),
            ));
        }
        if !(1.0..=240.0).contains(&self.fps) {
            return Err(ReelError::InvalidConfig(
                "frame rate must be between 1 and 240".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ReelError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        for dest in &self.livestream {
            if dest.endpoint.is_empty() {
                return Err(ReelError::InvalidConfig(
                    "live destination endpoint must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Load settings from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReelResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let settings: RenderSettings = toml::from_str(&contents)
            .map_err(|e| ReelError::InvalidConfig(format!("failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ReelResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ReelError::InvalidConfig(format!("failed to serialize settings: {e}")))?;
        fs::write(path, toml_string)?;
        log::info!("saved render settings to {:?}", path);
        Ok(())
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_quality(RecordingQuality::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        let settings = RenderSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.width, 1920);
        assert_eq!(settings.fps, 30.0);
        assert!(settings.realtime_pacing);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let settings = RenderSettings::new(321, 240, 30.0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_total_frames() {
        let settings =
            RenderSettings::new(320, 240, 30.0).with_capture_duration(Duration::from_secs(2));
        assert_eq!(settings.total_frames(), Some(60));

        let open_ended = RenderSettings::new(320, 240, 30.0);
        assert_eq!(open_ended.total_frames(), None);
    }

    #[test]
    fn test_frame_interval() {
        let settings = RenderSettings::new(320, 240, 25.0);
        assert_eq!(settings.frame_interval(), Duration::from_millis(40));
    }

    #[test]
    fn test_custom_bitrate_heuristic_clamped() {
        let tiny = RenderSettings::new(16, 16, 1.0);
        assert_eq!(tiny.default_bitrate(), 1_000_000);

        let huge = RenderSettings::new(3840, 2160, 60.0);
        assert_eq!(huge.default_bitrate(), 25_000_000);
    }

    #[test]
    fn test_livestream_builder() {
        let settings = RenderSettings::new(320, 240, 30.0)
            .add_livestream(LivestreamSettings::new("rtmp://a.example/live", "key-a"))
            .add_livestream(
                LivestreamSettings::new("rtmp://b.example/live", "key-b")
                    .with_bitrate(3_000_000)
                    .with_profile(H264Profile::Main),
            );
        assert_eq!(settings.livestream.len(), 2);
        assert_eq!(settings.livestream[1].bitrate, Some(3_000_000));
    }

    #[test]
    fn test_settings_json_round_trip() {
        let settings = RenderSettings::new(640, 480, 30.0).with_name("json");
        let json = serde_json::to_string(&settings).expect("serialize");
        let loaded: RenderSettings = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded.name, "json");
        assert_eq!(loaded.width, 640);
        assert_eq!(loaded.quality, RecordingQuality::Custom);
    }

    #[test]
    fn test_settings_toml_round_trip() {
        let dir = std::env::temp_dir().join("reelcast-config-test");
        let path = dir.join("settings.toml");
        let settings = RenderSettings::new(640, 480, 24.0)
            .with_name("round-trip")
            .with_capture_duration(Duration::from_secs(3));
        settings.save_to_file(&path).expect("save should succeed");

        let loaded = RenderSettings::load_from_file(&path).expect("load should succeed");
        assert_eq!(loaded.name, "round-trip");
        assert_eq!(loaded.total_frames(), Some(72));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
