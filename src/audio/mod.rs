//! Audio collaborator interface.
//!
//! The recording pipeline only drives audio through the primitives
//! below; mixing and playback internals live behind the trait.

use crate::errors::ReelResult;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Playback state of one loaded audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Loaded,
    Playing,
    Paused,
    Stopped,
}

/// Audio playback collaborator driven by the recorder.
///
/// Pausing the recording pauses all playing sources; resuming resumes
/// them; finishing stops everything.
pub trait AudioMixer: Send + Sync {
    fn setup(&self) -> ReelResult<()>;

    /// Load a source so it can be played during the session.
    fn load(&self, source: &Path) -> ReelResult<()>;

    fn play(&self, source: &Path);
    fn pause(&self, source: &Path);
    fn resume(&self, source: &Path);
    fn stop_source(&self, source: &Path);

    /// Pause every playing source (recorder paused).
    fn pause_all(&self);

    /// Resume every paused source (recorder resumed).
    fn resume_all(&self);

    /// Stop all playback (recording finished).
    fn stop(&self);
}

/// Bookkeeping mixer tracking named sources and their playback state.
///
/// Stands in for a real playback engine as the default collaborator and
/// in tests.
#[derive(Default)]
pub struct TrackedAudioMixer {
    sources: Mutex<HashMap<PathBuf, PlaybackState>>,
}

impl TrackedAudioMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current playback state of a source, if it has been loaded.
    pub fn state_of(&self, source: &Path) -> Option<PlaybackState> {
        self.sources
            .lock()
            .expect("audio mixer lock poisoned")
            .get(source)
            .copied()
    }
}

impl AudioMixer for TrackedAudioMixer {
    fn setup(&self) -> ReelResult<()> {
        Ok(())
    }

    fn load(&self, source: &Path) -> ReelResult<()> {
        self.sources
            .lock()
            .expect("audio mixer lock poisoned")
            .insert(source.to_path_buf(), PlaybackState::Loaded);
        debug!("loaded audio source {:?}", source);
        Ok(())
    }

    fn play(&self, source: &Path) {
        self.sources
            .lock()
            .expect("audio mixer lock poisoned")
            .insert(source.to_path_buf(), PlaybackState::Playing);
    }

    fn pause(&self, source: &Path) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        if let Some(state) = sources.get_mut(source) {
            if *state == PlaybackState::Playing {
                *state = PlaybackState::Paused;
            }
        }
    }

    fn resume(&self, source: &Path) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        if let Some(state) = sources.get_mut(source) {
            if *state == PlaybackState::Paused {
                *state = PlaybackState::Playing;
            }
        }
    }

    fn stop_source(&self, source: &Path) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        if let Some(state) = sources.get_mut(source) {
            *state = PlaybackState::Stopped;
        }
    }

    fn pause_all(&self) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        for state in sources.values_mut() {
            if *state == PlaybackState::Playing {
                *state = PlaybackState::Paused;
            }
        }
    }

    fn resume_all(&self) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        for state in sources.values_mut() {
            if *state == PlaybackState::Paused {
                *state = PlaybackState::Playing;
            }
        }
    }

    fn stop(&self) {
        let mut sources = self.sources.lock().expect("audio mixer lock poisoned");
        for state in sources.values_mut() {
            *state = PlaybackState::Stopped;
        }
    }
}
