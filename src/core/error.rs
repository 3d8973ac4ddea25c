//! Error types for playback sessions and processing collaborators.

use thiserror::Error;

/// Errors surfaced by the driver loop and session controls.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Re-encoding failed after exhausting retries.
    #[error("re-encode failed after {attempts} attempts")]
    ProcessFailed {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The offloaded execution path failed.
    #[error("offload error: {0}")]
    Offload(String),
    /// An awaited operation exceeded its time budget.
    #[error("timed out after {0} ms")]
    Timeout(u64),
    /// Settings could not be parsed or validated.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// The operation needs a loaded image.
    #[error("no active session")]
    NoSession,
}

/// Failure reported by a processing collaborator for a single generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// The encoder produced no output.
    #[error("encode failed: {0}")]
    Encode(String),
    /// The encoded output could not be decoded back.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The processor is gone (worker stopped, resources released).
    #[error("processor unavailable: {0}")]
    Unavailable(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
