//! Error types used throughout the bridge
//!
//! The taxonomy separates permanent per-message failures (`DecodeError`,
//! `SinkError::InvalidRequest`), transient per-message failures (the remaining
//! `SinkError` variants), and process-fatal credential failures (`AuthError`).

use thiserror::Error;

/// Payload validation failure. Permanent: a malformed payload can never
/// become valid by retrying, so these messages are rejected without requeue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("invalid time of day: {0}")]
    InvalidTime(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("date and time do not resolve in zone {zone}: {value}")]
    InvalidTimestamp { zone: String, value: String },

    #[error("weekly repeat requested without any weekdays")]
    EmptyRecurrence,

    #[error("invalid weekday code: {0}")]
    InvalidWeekday(String),
}

/// Credential source failure. Fatal for pending work: the consumer stops
/// pulling new deliveries instead of nacking indefinitely against broken
/// credentials.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credential storage error: {0}")]
    Storage(String),

    #[error("interactive authorization failed: {0}")]
    Interactive(String),

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),
}

/// Event sink failure, classified by how the consumer should respond.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink rejected the authorization handle. Recoverable by refreshing
    /// the token and retrying once within the same message cycle.
    #[error("authorization rejected by event sink")]
    AuthExpired,

    /// The sink signalled backoff. Recoverable via broker redelivery.
    #[error("event sink rate limited")]
    RateLimited,

    /// Malformed event data; the same descriptor will always fail.
    #[error("event sink rejected request: {0}")]
    InvalidRequest(String),

    /// Transient network or service failure, including timeouts.
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error type for bootstrap and transport plumbing.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl SinkError {
    /// Whether broker redelivery can plausibly succeed for this failure.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_matches_retry_policy() {
        assert!(SinkError::AuthExpired.is_transient());
        assert!(SinkError::RateLimited.is_transient());
        assert!(SinkError::Unavailable("boom".into()).is_transient());
        assert!(!SinkError::InvalidRequest("bad".into()).is_transient());
    }

    #[test]
    fn auth_error_converts_into_bridge_error() {
        let err: BridgeError = AuthError::Storage("corrupt token file".into()).into();
        assert!(matches!(err, BridgeError::Auth(AuthError::Storage(_))));
    }
}
