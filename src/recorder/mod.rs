//! Recording controller: state machine, capture loop, completion.

mod recorder;
mod state;

pub use recorder::{Recorder, RecorderEvent, RecordingOutcome};
pub use state::RecordingState;
