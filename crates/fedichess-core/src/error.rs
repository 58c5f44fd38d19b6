//! Error types for the bridge client

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bridge process could not be created
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    /// `start` called while a bridge is already running
    #[error("Bridge already started")]
    AlreadyStarted,

    /// Operation needs a running bridge
    #[error("bridge not started")]
    NotStarted,

    /// Signalling or reaping the bridge process failed
    #[error("Process error: {0}")]
    ProcessError(String),

    /// The bridge's stdin rejected a line
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// No matching reply before the budget ran out or the bridge stopped
    #[error("no response")]
    NoResponse,

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_response_reads_as_diagnostic() {
        assert_eq!(BridgeError::NoResponse.to_string(), "no response");
        assert_eq!(BridgeError::NotStarted.to_string(), "bridge not started");
    }

    #[test]
    fn serde_errors_convert() {
        let err: BridgeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, BridgeError::SerializationError(_)));
    }
}
