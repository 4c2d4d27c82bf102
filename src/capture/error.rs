//! Error types for location capture.
//!
//! The facade raises only [`CaptureError::EngineUnavailable`] itself; every
//! other variant originates in a capture engine and reaches the caller
//! unchanged.

use thiserror::Error;

/// Error type for capture operations.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No capture engine is present on this platform.
    #[error("Location capture engine is not available on this platform")]
    EngineUnavailable,

    /// The device has no usable location provider.
    #[error("No location provider is available")]
    NoProvider,

    /// The location provider is out of service.
    #[error("Location provider is out of service")]
    OutOfService,

    /// The location provider is temporarily unavailable.
    #[error("Location provider is temporarily unavailable")]
    TemporarilyUnavailable,

    /// The user or the platform denied location access.
    #[error("Location access denied")]
    PermissionDenied,

    /// `start` was called while capture is already running.
    #[error("Location capture is already running")]
    AlreadyCapturing,

    /// The configuration could not be applied.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The anchor was not produced by this engine.
    #[error("Invalid anchor: {0}")]
    InvalidAnchor(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Uploading queued locations failed.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// An engine-specific failure not covered above.
    #[error("Engine error [{code}]: {message}")]
    Engine {
        /// Machine-readable rejection code.
        code: String,
        /// Human-readable detail.
        message: String,
    },
}

impl CaptureError {
    /// Returns the rejection code native capture modules use for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::EngineUnavailable => "UNAVAILABLE",
            Self::NoProvider => "NO GPS PROVIDER",
            Self::OutOfService => "OUT OF SERVICE",
            Self::TemporarilyUnavailable => "TEMPORARILY UNAVAILABLE",
            Self::PermissionDenied => "DENIED",
            Self::AlreadyCapturing => "ALREADY CAPTURING",
            Self::InvalidConfiguration(_) => "INVALID CONFIGURATION",
            Self::InvalidAnchor(_) => "INVALID ANCHOR",
            Self::Storage(_) | Self::Database(_) => "STORAGE",
            Self::Upload(_) => "UPLOAD",
            Self::Engine { code, .. } => code,
        }
    }
}

/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upload(err.to_string())
    }
}
