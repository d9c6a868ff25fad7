//! Error types for the harvester runtime.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a harvest.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the pure session layer (configuration, limits).
    #[error(transparent)]
    Core(#[from] lnaddr_core::Error),

    /// Nostr SDK error.
    #[error("Nostr SDK error: {0}")]
    NostrSdk(#[from] nostr_sdk::client::Error),

    /// The subscription could not be opened.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was called while a run is still active.
    #[error("a harvest is already running")]
    AlreadyRunning,

    /// The run task panicked or was cancelled.
    #[error("harvest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: Error = lnaddr_core::Error::NoValidEndpoints.into();
        assert!(matches!(err, Error::Core(lnaddr_core::Error::NoValidEndpoints)));
        assert_eq!(
            err.to_string(),
            lnaddr_core::Error::NoValidEndpoints.to_string()
        );
    }

    #[test]
    fn test_subscription_display() {
        let err = Error::Subscription("no relay could be added".to_string());
        assert!(err.to_string().contains("no relay could be added"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
