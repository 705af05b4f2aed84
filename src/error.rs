//! Error types for the telemetry sync client.
//!
//! No error in this crate is fatal to the process. Transport failures are
//! recovered by reconnecting, malformed frames are dropped, and commands issued
//! while offline are discarded. The variants exist so callers and logs can tell
//! these situations apart.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connection drops and failed connection attempts
//! - **Decode Errors**: inbound frames that are not valid envelopes
//! - **Command Errors**: commands issued with no open session, or with bad parameters
//! - **Configuration Errors**: unreadable config files and invalid endpoints
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use lapsync::SyncError;
//!
//! let error = SyncError::transport("connection reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sync client operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Main error type for sync client operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to decode message: {details}")]
    Decode {
        details: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("No open session, dropped command '{command}'")]
    NotConnected { command: String },

    #[error("Invalid value {value} for '{parameter}': {reason}")]
    InvalidParameter { parameter: &'static str, value: i64, reason: String },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Config file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Client has been shut down")]
    Shutdown,
}

impl SyncError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { .. } => true,
            SyncError::NotConnected { .. } => true,
            SyncError::Decode { .. } => false,
            SyncError::InvalidParameter { .. } => false,
            SyncError::InvalidEndpoint { .. } => false,
            SyncError::Config { .. } => false,
            SyncError::File { .. } => false,
            SyncError::Shutdown => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SyncError::Transport { .. } => vec![
                "Check that the lap timer is powered and reachable",
                "Verify you are joined to the timer's WiFi network",
                "Wait for the automatic reconnect",
            ],
            SyncError::Decode { .. } => vec![
                "Check that the timer firmware speaks the same message format",
                "Inspect the raw frame in debug logs",
            ],
            SyncError::NotConnected { .. } => vec![
                "Wait for the connection to come back and send the command again",
                "Check the connection state before issuing commands",
            ],
            SyncError::InvalidParameter { .. } => vec![
                "Use a frequency between 5645 and 5945 MHz",
                "Check the value entered in the UI",
            ],
            SyncError::InvalidEndpoint { .. } => vec![
                "Use a ws:// or wss:// URL",
                "Derive the endpoint from the page origin with ClientConfig::for_origin",
            ],
            SyncError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Compare field names against ClientConfig",
            ],
            SyncError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            SyncError::Shutdown => vec!["Create a new client"],
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        SyncError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SyncError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for decode errors that have no underlying JSON error.
    pub fn decode(details: impl Into<String>) -> Self {
        SyncError::Decode { details: details.into(), source: None }
    }

    /// Helper constructor for commands dropped while offline.
    pub fn not_connected(command: impl Into<String>) -> Self {
        SyncError::NotConnected { command: command.into() }
    }

    /// Helper constructor for out-of-range command parameters.
    pub fn invalid_parameter(
        parameter: &'static str,
        value: i64,
        reason: impl Into<String>,
    ) -> Self {
        SyncError::InvalidParameter { parameter, value, reason: reason.into() }
    }

    /// Helper constructor for endpoint errors.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::InvalidEndpoint { endpoint: endpoint.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SyncError::File { path, source }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode { details: err.to_string(), source: Some(err) }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidEndpoint { endpoint: "<unparsed>".to_string(), reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            command in "[a-z_]+",
            value in -10_000i64..10_000i64,
          ) {
            let transport = SyncError::transport(reason.clone());
            let offline = SyncError::not_connected(command.clone());
            let invalid = SyncError::invalid_parameter("frequency", value, reason.clone());

            prop_assert!(transport.to_string().contains(&reason));
            prop_assert!(offline.to_string().contains(&command));
            prop_assert!(invalid.to_string().contains(&value.to_string()));
            prop_assert!(invalid.to_string().contains("frequency"));
          }

          #[test]
          fn transport_source_chain_is_preserved(base in ".*") {
            let io = std::io::Error::other(base.clone());
            let err = SyncError::transport_with_source("socket closed", Box::new(io));
            let source = std::error::Error::source(&err).map(|s| s.to_string());
            prop_assert_eq!(source, Some(base));
          }
        }
    }

    #[test]
    fn retry_classification() {
        assert!(SyncError::transport("reset").is_retryable());
        assert!(SyncError::not_connected("start_race").is_retryable());
        assert!(!SyncError::decode("bad json").is_retryable());
        assert!(!SyncError::invalid_parameter("frequency", 1, "out of band").is_retryable());
        assert!(!SyncError::Shutdown.is_retryable());
    }

    #[test]
    fn every_error_has_recovery_suggestions() {
        let errors = vec![
            SyncError::transport("x"),
            SyncError::decode("x"),
            SyncError::not_connected("x"),
            SyncError::invalid_parameter("threshold", 0, "x"),
            SyncError::invalid_endpoint("x", "y"),
            SyncError::config("x", "y"),
            SyncError::file_error(PathBuf::from("a.yaml"), std::io::Error::other("x")),
            SyncError::Shutdown,
        ];

        for error in errors {
            assert!(!error.recovery_suggestions().is_empty(), "{error} has no suggestions");
        }
    }

    #[test]
    fn json_errors_become_decode_errors() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::Decode { source: Some(_), .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn url_errors_become_endpoint_errors() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: SyncError = parse_err.into();
        assert!(matches!(err, SyncError::InvalidEndpoint { .. }));
    }
}
