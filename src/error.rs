//! Error types for speaker operations.

use std::io;
use thiserror::Error;

use crate::cancel::Cancelled;
use crate::notes::ParseError;

/// Convenient result alias for speaker operations.
pub type Result<T> = std::result::Result<T, SpeakerError>;

/// Errors that may occur while playing tones, files, or speech.
///
/// None of these are retried internally; retry policy, if any, belongs to
/// the caller.
#[derive(Debug, Error)]
pub enum SpeakerError {
    /// A note token was rejected by the notation grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Writing to the tone device failed.
    #[error("tone device write failed: {0}")]
    Device(#[source] io::Error),

    /// An external renderer process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to launch, e.g. `aplay`.
        program: String,
        #[source]
        source: io::Error,
    },

    /// An external renderer ran but reported failure. The message carries
    /// the renderer's captured stderr when it printed any.
    #[error("{action} failed: {message}")]
    Render {
        /// What the speaker was doing, e.g. "playing file".
        action: &'static str,
        /// Diagnostic from the renderer.
        message: String,
    },

    /// The in-flight operation was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for SpeakerError {
    fn from(_: Cancelled) -> Self {
        SpeakerError::Cancelled
    }
}
