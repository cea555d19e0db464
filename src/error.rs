use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the Starling federation service
#[derive(Debug)]
pub enum FederationError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Malformed client input: bad notify body, malformed search aggregate
    Api(String),

    /// Peer registry persistence errors
    Storage(String),

    /// A single outbound call to a peer failed
    Peer(PeerError),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Background task failures
    Concurrency(String),
}

/// Why one call to one peer failed.
///
/// Every variant is recoverable at the cycle level: the peer is recorded as
/// dead and the cycle continues without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// The call did not complete within the per-call timeout
    Timeout(String),

    /// Connection refused, DNS failure, TLS failure...
    Connection(String),

    /// The peer answered with a non-success status
    BadStatus(u16),

    /// The peer answered 2xx with a body we could not use
    BadBody(String),
}

impl fmt::Display for FederationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederationError::Config(msg) => write!(f, "Configuration error: {}", msg),
            FederationError::Api(msg) => write!(f, "API error: {}", msg),
            FederationError::Storage(msg) => write!(f, "Storage error: {}", msg),
            FederationError::Peer(err) => write!(f, "Peer error: {}", err),
            FederationError::Io(err) => write!(f, "I/O error: {}", err),
            FederationError::Serialization(err) => write!(f, "Serialization error: {}", err),
            FederationError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Timeout(msg) => write!(f, "timed out: {}", msg),
            PeerError::Connection(msg) => write!(f, "connection failed: {}", msg),
            PeerError::BadStatus(code) => write!(f, "unexpected status {}", code),
            PeerError::BadBody(msg) => write!(f, "invalid response body: {}", msg),
        }
    }
}

impl std::error::Error for FederationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FederationError::Io(err) => Some(err),
            FederationError::Serialization(err) => Some(err),
            FederationError::Peer(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for PeerError {}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, FederationError>;

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for FederationError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl FederationError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FederationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FederationError::Api(_) => StatusCode::BAD_REQUEST,
            FederationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FederationError::Peer(_) => StatusCode::BAD_GATEWAY,
            FederationError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FederationError::Serialization(_) => StatusCode::BAD_REQUEST,
            FederationError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            FederationError::Config(_) => "configuration_error",
            FederationError::Api(_) => "api_error",
            FederationError::Storage(_) => "storage_error",
            FederationError::Peer(_) => "peer_error",
            FederationError::Io(_) => "io_error",
            FederationError::Serialization(_) => "serialization_error",
            FederationError::Concurrency(_) => "concurrency_error",
        }
    }
}

impl From<reqwest::Error> for PeerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PeerError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            PeerError::BadStatus(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            PeerError::BadBody(err.to_string())
        } else {
            PeerError::Connection(err.to_string())
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for FederationError {
    fn from(err: std::io::Error) -> Self {
        FederationError::Io(err)
    }
}

impl From<serde_json::Error> for FederationError {
    fn from(err: serde_json::Error) -> Self {
        FederationError::Serialization(err)
    }
}

impl From<rusqlite::Error> for FederationError {
    fn from(err: rusqlite::Error) -> Self {
        FederationError::Storage(err.to_string())
    }
}

impl From<PeerError> for FederationError {
    fn from(err: PeerError) -> Self {
        FederationError::Peer(err)
    }
}

impl From<tokio::task::JoinError> for FederationError {
    fn from(err: tokio::task::JoinError) -> Self {
        FederationError::Concurrency(format!("Background task failed: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::FederationError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::FederationError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! api_error {
    ($msg:expr) => {
        $crate::error::FederationError::Api($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::FederationError::Api(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr) => {
        $crate::error::FederationError::Storage($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::FederationError::Storage(format!($fmt, $($arg)*))
    };
}
