//! Error types for the Ninox API client.
//!
//! # Design
//! Only failures that leave the caller without a response are errors. A
//! well-formed 4xx/5xx reply is a successful call and comes back as a
//! `NinoxResponse` carrying that status; callers inspect it with
//! `is_ok` / `needs_throttle`.

use thiserror::Error;

/// Errors returned by `NinoxClient` and `Transport` implementations.
#[derive(Error, Debug)]
pub enum NinoxError {
    /// The HTTP round-trip never completed (DNS, connect, TLS, I/O).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The request could not be put on the wire (bad URL, header or method).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A response body could not be deserialized into the requested type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl NinoxError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        NinoxError::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, NinoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_message() {
        let err = NinoxError::transport("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn serialization_error_wraps_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = NinoxError::Serialization(serde_err);
        assert!(err.to_string().starts_with("serialization failed:"));
    }
}
