//! Error types for the harvest core.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running a harvest session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The relay configuration produced no usable `wss://` endpoint.
    #[error("no valid relay endpoints (expected wss:// URLs)")]
    NoValidEndpoints,

    /// A harvest limit is outside its usable range.
    #[error("invalid limit '{field}': {reason}")]
    InvalidLimit {
        /// The name of the offending limit.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_valid_endpoints_display() {
        let msg = Error::NoValidEndpoints.to_string();
        assert!(msg.contains("no valid relay endpoints"));
        assert!(msg.contains("wss://"));
    }

    #[test]
    fn test_invalid_limit_display() {
        let err = Error::InvalidLimit {
            field: "max_addresses",
            reason: "must be at least 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("max_addresses"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::InvalidLimit {
            field: "timeout",
            reason: "zero".to_string(),
        };
        let debug = format!("{:?}", err);
        assert!(debug.contains("InvalidLimit"));
        assert!(debug.contains("timeout"));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<()> = Err(Error::NoValidEndpoints);
        assert!(matches!(result, Err(Error::NoValidEndpoints)));
    }
}
