//! Port interfaces for the external collaborators
//!
//! The calendar provider and the credential provider are opaque capabilities
//! behind these traits; `chime-infra` supplies the real implementations and
//! tests supply mocks.

use async_trait::async_trait;
use chime_domain::{AlarmDescriptor, AuthError, EventRef, SinkError};

/// Capability to create a single event in the external calendar.
///
/// Implementations perform exactly one network call per invocation and never
/// retry internally; the retry policy belongs to the queue consumer.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn create_event(
        &self,
        access_token: &str,
        alarm: &AlarmDescriptor,
    ) -> Result<EventRef, SinkError>;
}

/// Capability to supply a valid, possibly-refreshed authorization handle.
///
/// Implementations own the token state exclusively and serialize refreshes:
/// concurrent callers needing a fresh token wait for the in-flight refresh
/// rather than triggering their own.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current access token, refreshed transparently when near expiry.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Force a refresh, bypassing the expiry check. Used after the sink
    /// rejects a token that still looked valid locally.
    async fn refresh_access_token(&self) -> Result<String, AuthError>;
}
