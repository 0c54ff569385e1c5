//! Error types for full-page capture

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or stitching a page
#[derive(Error, Debug)]
pub enum Error {
    /// A capture session is already running on this page
    #[error("Capture already in progress")]
    AlreadyCapturing,

    /// No page was available to capture
    #[error("No active tab found")]
    NoActiveTarget,

    /// The page-side helpers could not be installed
    #[error("Failed to inject capture helpers: {0}")]
    InjectionFailure(String),

    /// The page never answered the start-capture handshake
    #[error("Content script communication failed after {attempts} attempts: {last}")]
    CommunicationTimeout { attempts: u32, last: String },

    /// The page is not reachable yet (transient, retried by the handshake)
    #[error("Page not reachable: {0}")]
    Unreachable(String),

    /// A single viewport capture failed; the whole capture is aborted
    #[error("Failed to capture section: {0}")]
    SectionCaptureFailure(String),

    /// The walk finished without producing a single section
    #[error("No sections captured")]
    NoSectionsCaptured,

    /// Compositing the captured sections failed
    #[error("Failed to merge images: {0}")]
    MergeFailure(#[from] MergeError),

    /// The compositor's hosting context failed or went away
    #[error("Compositor error: {0}")]
    HostingContextError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to hand the finished image to storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),
}

impl Error {
    /// Whether retrying the same call later may succeed.
    ///
    /// Only reachability failures qualify; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }
}

/// Failures of the compositor's merge operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("No images to merge")]
    NoImages,

    #[error("Failed to load image {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("Invalid image dimensions ({width}x{height})")]
    InvalidDimensions { width: u64, height: u64 },

    #[error("Failed to encode merged image: {0}")]
    Encode(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
