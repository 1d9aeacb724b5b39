//! Error types for the recording and streaming pipeline.

use thiserror::Error;

/// Errors produced by the recording and streaming pipeline.
#[derive(Debug, Error)]
pub enum ReelError {
    /// A writer or aggregate stream configuration could not be initialized.
    #[error("setup error: {0}")]
    Setup(String),

    /// H.264 encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The container writer rejected a sample or could not be finalized.
    #[error("muxing error: {0}")]
    Muxing(String),

    /// A live destination failed to connect, publish, append, or close.
    #[error("destination error: {0}")]
    Destination(String),

    /// The final trim/export step failed.
    #[error("export error: {0}")]
    Export(String),

    /// The audio mixer rejected an operation.
    #[error("audio error: {0}")]
    Audio(String),

    /// Render settings failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used across the crate.
pub type ReelResult<T> = Result<T, ReelError>;
