//! Error types for the try-on overlay library.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or processing failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Camera or detector could not be acquired; halts the session
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Overlay image or derived shadow is missing
    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    /// Per-target settings could not be retrieved
    #[error("Settings fetch error: {0}")]
    SettingsFetch(String),

    /// The current video frame could not be read
    #[error("Frame read error: {0}")]
    FrameRead(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Drawing surface could not be created or written
    #[error("Render error: {0}")]
    Render(String),

    /// Operation not allowed in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Reasons the camera or the landmark detector could not be brought up
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The user refused camera access
    #[error("camera permission denied")]
    PermissionDenied,

    /// No usable camera device
    #[error("no camera device available")]
    NoDevice,

    /// The landmark detector failed to load
    #[error("detector failed to load: {0}")]
    DetectorLoad(String),

    /// Camera acquisition did not complete in time
    #[error("camera acquisition timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether this error must stop the session state machine
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Acquisition(_) | Self::FrameRead(_))
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
