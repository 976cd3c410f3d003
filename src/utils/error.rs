//! Error types for randplay
//!
//! Each collaborator of the playback controller has its own error enum so the
//! controller can report exactly which part failed. `ControlError` is what the
//! controller hands back to callers; `RandplayError` covers application-level
//! concerns such as configuration loading.

use thiserror::Error;

/// Failure to obtain a new entry from the remote source
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx status or an unparseable body
    #[error("Bad response: {0}")]
    BadResponse(String),

    /// The response carried no usable URL
    #[error("No video URL in response")]
    Empty,
}

/// Failure while downloading the current entry to disk
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad response: {0}")]
    BadResponse(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Local files are not downloadable
    #[error("Current entry is a local file, not a remote URL")]
    NotRemote,

    #[error("No current entry to download")]
    NoCurrentEntry,
}

/// Playlist indexing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("Index {index} out of range for playlist of {len} entries")]
    OutOfRange { index: isize, len: usize },

    #[error("No current entry selected")]
    NoCurrentEntry,
}

/// Errors passed through from the playback engine
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// The media could not be opened (unplayable, missing file, ...)
    #[error("Cannot open media: {0}")]
    Open(String),

    /// A transport or volume command failed
    #[error("Engine command failed: {0}")]
    Command(String),

    /// The engine backend is not available on this system
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Errors reading or writing persisted documents
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but does not describe a valid state
    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// Error returned from every playback controller operation
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("Playback failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Convenience alias for controller results
pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// Application-level error type
#[derive(Error, Debug)]
pub enum RandplayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Errors surfaced from the controller
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Engine construction errors
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for application-level results
pub type Result<T> = std::result::Result<T, RandplayError>;

/// Extension trait for converting foreign errors into configuration errors
pub trait IntoConfigError<T> {
    /// Convert this error into a `RandplayError::Config` with the given context
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoConfigError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| RandplayError::Config(format!("{}: {}", context, e)))
    }
}
