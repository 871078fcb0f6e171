//! Service error taxonomy.
//!
//! Every component returns a typed outcome; errors collapse into the
//! `{success:false, error}` wire envelope only at the dispatcher boundary.
//! Display strings are part of the protocol contract — callers substring
//! match on them, so keep them stable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input stream was empty after trimming.
    #[error("No input data provided")]
    EmptyInput,

    /// Image payload could not be decoded (bad base64 or bad image bytes).
    /// The underlying cause is logged, not surfaced.
    #[error("Could not decode image")]
    Decode,

    /// The detection capability never initialized and the requested
    /// operation strictly requires it.
    #[error("Model not loaded")]
    ModelUnavailable,

    /// Capture device could not be acquired.
    #[error("Could not open camera {index}")]
    CameraOpen { index: u32 },

    /// Frame read failed or the session is not running.
    #[error("Could not get frame")]
    FrameRead,

    /// Command named an action neither variant recognizes.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Catch-all for faults that must not escape the command cycle.
    #[error("Service error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(format!("{err:#}"))
    }
}
