//! Unified error hierarchy for glucors
//!
//! Configuration problems are detected before any network activity; upstream
//! failures abort the run. A day without readings is not an error.

use std::fmt;
use thiserror::Error;

/// Top-level error type for all glucors operations
#[derive(Debug, Error)]
pub enum GlucoRsError {
    /// A required setting is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed request against the data server or the chat API
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// External service a request was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Nightscout,
    Telegram,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Nightscout => write!(f, "Nightscout"),
            Service::Telegram => write!(f, "Telegram"),
        }
    }
}

/// Upstream request errors
///
/// `endpoint` is a short label (e.g. `entries.json`, `sendMessage`), never a
/// full URL, since Telegram URLs embed the bot token.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-success HTTP status
    #[error("{service} {endpoint} returned HTTP {status}")]
    Status {
        service: Service,
        endpoint: String,
        status: u16,
    },

    /// Connection, TLS or timeout failure
    #[error("{service} {endpoint} unreachable: {reason}")]
    Transport {
        service: Service,
        endpoint: String,
        reason: String,
    },

    /// Response body could not be decoded
    #[error("{service} {endpoint} sent an unexpected response: {reason}")]
    Decode {
        service: Service,
        endpoint: String,
        reason: String,
    },
}

impl UpstreamError {
    pub fn service(&self) -> Service {
        match self {
            UpstreamError::Status { service, .. }
            | UpstreamError::Transport { service, .. }
            | UpstreamError::Decode { service, .. } => *service,
        }
    }
}

/// Result type alias for glucors operations
pub type Result<T> = std::result::Result<T, GlucoRsError>;

impl GlucoRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GlucoRsError::Configuration(_) => ErrorSeverity::Critical,
            GlucoRsError::Upstream(UpstreamError::Decode { .. }) => ErrorSeverity::Warning,
            GlucoRsError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            GlucoRsError::Configuration(reason) => {
                format!("Invalid configuration: {}. Check your environment variables.", reason)
            }
            GlucoRsError::Upstream(UpstreamError::Status { service, status: 401, .. }) => {
                format!("{} rejected the credentials (HTTP 401). Check the API secret or bot token.", service)
            }
            GlucoRsError::Upstream(UpstreamError::Transport { service, .. }) => {
                format!("Could not reach {}. Check the URL and network connectivity.", service)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Run cannot start at all
    Critical,
    /// Run aborted
    Error,
    /// Unexpected but explainable upstream behaviour
    Warning,
}
