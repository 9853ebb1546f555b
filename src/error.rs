//! Error types for the reel runtime.
//!
//! The normalizer and the playback coordinator never fail: malformed events
//! become `None` and unresolved titles become a `ShowError` effect. These
//! variants cover the ambient surfaces around them.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Catalog could not be built (duplicate or empty titles).
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Playable URL resolution or signing error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Tracking collaborator error.
    #[error("tracking error: {0}")]
    Tracking(String),

    /// Host command routing error.
    #[error("host error: {0}")]
    Host(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReelError>;
