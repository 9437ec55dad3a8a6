//! Error types shared across MediaShrink crates.

use std::path::PathBuf;

/// Top-level error type for MediaShrink operations.
///
/// Every variant is terminal for the call that produced it. The engine never
/// retries; a retry is always a fresh invocation by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ShrinkError {
    /// The host lacks a required primitive (capture, incremental encoding,
    /// audio routing, or a usable output format).
    #[error("Unsupported capability: {message}")]
    UnsupportedCapability { message: String },

    #[error("Decode failure: {message}")]
    DecodeFailure { message: String },

    /// A single encode of an in-memory surface failed.
    #[error("Encode failure: {message}")]
    EncodeFailure { message: String },

    /// An incremental encoder or the playback element failed mid-session.
    #[error("Capture error: {message}")]
    RuntimeCapture { message: String },

    #[error("Invalid target: {message}")]
    InvalidTarget { message: String },

    #[error("Invalid session state: {message}")]
    InvalidState { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Lookup error: {message}")]
    Lookup { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShrinkError.
pub type ShrinkResult<T> = Result<T, ShrinkError>;

impl ShrinkError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::RuntimeCapture {
            message: msg.into(),
        }
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error means the host environment itself is the problem.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedCapability { .. })
    }
}
