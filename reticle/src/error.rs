//! Error types for the targeting engine.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything the engine can refuse to do.
///
/// There is no retry logic anywhere in the crate: a variant either signals a
/// violated precondition or a failed collaborator, and the control loops stop
/// on the first one they see.
#[derive(Error, Debug)]
pub enum Error {
    #[error("time delta must be positive and finite, got {0}")]
    InvalidTimeDelta(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported mouse button: {0}")]
    UnsupportedButton(String),

    #[error("mouse button {0} is not pressed")]
    ButtonNotPressed(String),

    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("actuator failed: {0}")]
    Actuator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Self::Capture(msg.into())
    }

    pub fn actuator<S: Into<String>>(msg: S) -> Self {
        Self::Actuator(msg.into())
    }
}
