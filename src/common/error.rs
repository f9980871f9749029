//! Error types for the smoke test harness
//!
//! Error messages are written so that a failed run points at the phase and
//! the remote resource that caused it.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the smoke test harness
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Service Errors ===
    #[error("Engine unreachable at {url}: {reason}")]
    RemoteUnavailable { url: String, reason: String },

    #[error("{method} {url} returned HTTP {status}: {body}")]
    RemoteError {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Request to {url} timed out: {reason}")]
    Timeout { url: String, reason: String },

    #[error("HTTP transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Engine did not become ready after {attempts} attempts. Set readiness.on_exhausted = \"continue\" to proceed anyway")]
    ReadinessExhausted { attempts: u32 },

    // === Container Errors ===
    #[error("Failed to provision container: {0}")]
    Provisioning(String),

    #[error("Failed to tear down container {id}: {reason}")]
    Teardown { id: String, reason: String },

    // === Run Control ===
    #[error("Run interrupted")]
    Interrupted,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a remote error from a non-success response
    pub fn remote_error(method: &str, url: &str, status: u16, body: &str) -> Self {
        Self::RemoteError {
            method: method.to_string(),
            url: url.to_string(),
            status,
            body: body.to_string(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a teardown error
    pub fn teardown(id: &str, reason: impl Into<String>) -> Self {
        Self::Teardown {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the engine could simply not be reached yet
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::RemoteUnavailable { .. })
    }

    /// Whether the engine accepted the connection but answered too slowly
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// HTTP status carried by a remote error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_message_names_request() {
        let err = Error::remote_error("POST", "http://localhost:8081/testInput", 500, "boom");
        assert_eq!(
            err.to_string(),
            "POST http://localhost:8081/testInput returned HTTP 500: boom"
        );
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_unavailable_classification() {
        let err = Error::RemoteUnavailable {
            url: "http://localhost:8080/nifi-api/flow/status".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.is_unavailable());
        assert_eq!(err.status(), None);

        let err = Error::Timeout {
            url: "http://localhost:8080/nifi-api/counters".to_string(),
            reason: "operation timed out".to_string(),
        };
        assert!(err.is_timeout());
        assert!(!err.is_unavailable());
    }
}
