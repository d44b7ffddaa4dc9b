//! Error types and handling for RustyRadish
//!
//! Defines the error taxonomy used throughout the server and the conversion
//! into client-facing RESP error strings.

use thiserror::Error;
use tracing::{debug, error, warn};

/// Severity buckets used to pick a log level for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Persistence failures and invariant violations.
    Critical,
    /// Network and connection faults that end a session.
    High,
    /// Recoverable protocol-level trouble.
    Medium,
    /// Expected client mistakes (bad arity, wrong type, unknown command).
    Low,
}

/// Main error type for RustyRadish operations.
#[derive(Debug, Error)]
pub enum RustyRadishError {
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },

    #[error("wrong number of arguments for '{command}' command")]
    WrongArity { command: String },

    #[error("value is not an integer or out of range: {value}")]
    NotAnInteger { value: String },

    #[error("key '{key}' holds a value of the wrong type")]
    WrongType { key: String },

    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    #[error("payload too large: {size} bytes exceeds cap of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("connection error: {message}")]
    ConnectionError {
        message: String,
        connection_id: Option<String>,
    },

    #[error("operation timed out: {message}")]
    TimeoutError { message: String },

    #[error("persistence error: {message}")]
    PersistenceError {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("configuration error: {message}")]
    ConfigError {
        message: String,
        config_key: Option<String>,
    },

    #[error("internal error: {message}")]
    InternalError {
        message: String,
        component: Option<String>,
    },
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, RustyRadishError>;

impl RustyRadishError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RustyRadishError::UnknownCommand { .. }
            | RustyRadishError::WrongArity { .. }
            | RustyRadishError::NotAnInteger { .. }
            | RustyRadishError::WrongType { .. } => ErrorSeverity::Low,

            RustyRadishError::ProtocolError { .. }
            | RustyRadishError::PayloadTooLarge { .. }
            | RustyRadishError::TimeoutError { .. } => ErrorSeverity::Medium,

            RustyRadishError::NetworkError { .. }
            | RustyRadishError::ConnectionError { .. }
            | RustyRadishError::ConfigError { .. } => ErrorSeverity::High,

            RustyRadishError::PersistenceError { .. }
            | RustyRadishError::InternalError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether this is a client mistake rather than a server fault. Client
    /// errors get a reply and keep the connection alive; they are logged
    /// quietly.
    pub fn is_client_error(&self) -> bool {
        self.severity() == ErrorSeverity::Low
    }

    /// Render the error as the payload of a RESP `-ERR ...` reply.
    pub fn to_client_error(&self) -> String {
        match self {
            RustyRadishError::UnknownCommand { command } => {
                format!("ERR unknown command '{command}'")
            }
            RustyRadishError::WrongArity { command } => {
                format!("ERR wrong number of arguments for '{command}' command")
            }
            RustyRadishError::NotAnInteger { .. } => {
                "ERR value is not an integer or out of range".to_string()
            }
            RustyRadishError::WrongType { .. } => {
                "ERR operation against a key holding the wrong kind of value".to_string()
            }
            RustyRadishError::ProtocolError { message } => {
                format!("ERR protocol error: {message}")
            }
            RustyRadishError::PayloadTooLarge { .. } => "ERR payload too large".to_string(),
            RustyRadishError::TimeoutError { message } => format!("ERR timeout: {message}"),
            _ => "ERR internal error".to_string(),
        }
    }

    /// Log the error at a level matching its severity.
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(error = %self, "operation failed");
            }
            ErrorSeverity::Medium => {
                warn!(error = %self, "operation failed");
            }
            ErrorSeverity::Low => {
                debug!(error = %self, "client error");
            }
        }
    }
}

impl From<std::io::Error> for RustyRadishError {
    fn from(error: std::io::Error) -> Self {
        RustyRadishError::NetworkError {
            message: error.to_string(),
            source: Some(error),
        }
    }
}

impl From<std::num::ParseIntError> for RustyRadishError {
    fn from(error: std::num::ParseIntError) -> Self {
        RustyRadishError::NotAnInteger {
            value: error.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for RustyRadishError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RustyRadishError::TimeoutError {
            message: "operation timed out".to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for RustyRadishError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        RustyRadishError::ProtocolError {
            message: format!("invalid UTF-8 sequence: {error}"),
        }
    }
}
