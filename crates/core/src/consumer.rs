//! Per-message processing state machine
//!
//! Drives one delivery through decode → create-event → disposition:
//!
//! ```text
//! Received → Decoding → (Decoded | Rejected) → Creating → (Acked | Nacked)
//! ```
//!
//! The transport layer maps the returned [`Outcome`] onto broker
//! acknowledgements; this module never touches the queue itself.

use std::sync::Arc;

use chime_domain::{AuthError, EventRef, SinkError};
use tracing::{debug, warn};

use crate::decode::AlarmDecoder;
use crate::ports::{CredentialSource, EventSink};

/// How the transport must resolve the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the event was created.
    Ack,
    /// Reject without requeue: permanent failure, retrying cannot succeed.
    Reject,
    /// Reject with requeue: transient failure, broker should redeliver.
    Requeue,
}

/// Terminal outcome of one message-processing cycle.
#[derive(Debug)]
pub enum Outcome {
    /// Event created in the external calendar.
    Created(EventRef),
    /// Permanently rejected (malformed payload or invalid event data).
    RejectedPermanent(String),
    /// Transient failure; the delivery goes back to the broker.
    Requeued(String),
    /// The credential source failed. The delivery is requeued and the
    /// consume loop must halt rather than keep nacking against broken
    /// credentials.
    AuthFailure(AuthError),
}

impl Outcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Created(_) => Disposition::Ack,
            Self::RejectedPermanent(_) => Disposition::Reject,
            Self::Requeued(_) | Self::AuthFailure(_) => Disposition::Requeue,
        }
    }

    /// True when the consumer must stop pulling new deliveries.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }
}

/// Decode-and-deliver pipeline for a single alarm message.
pub struct AlarmProcessor {
    decoder: AlarmDecoder,
    sink: Arc<dyn EventSink>,
    credentials: Arc<dyn CredentialSource>,
}

impl AlarmProcessor {
    pub fn new(
        decoder: AlarmDecoder,
        sink: Arc<dyn EventSink>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self { decoder, sink, credentials }
    }

    /// Process one payload to a terminal outcome. Exactly one create-event
    /// call is in flight for this payload at any time; a second call happens
    /// only after a token refresh, never concurrently.
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        let alarm = match self.decoder.decode(payload) {
            Ok(alarm) => alarm,
            Err(err) => {
                warn!(error = %err, "rejecting undecodable alarm payload");
                return Outcome::RejectedPermanent(err.to_string());
            }
        };

        let token = match self.credentials.access_token().await {
            Ok(token) => token,
            Err(err) => return Outcome::AuthFailure(err),
        };

        match self.sink.create_event(&token, &alarm).await {
            Ok(event) => Outcome::Created(event),
            Err(SinkError::AuthExpired) => {
                debug!("sink rejected token, refreshing and retrying once");
                self.retry_with_fresh_token(&alarm).await
            }
            Err(SinkError::InvalidRequest(reason)) => Outcome::RejectedPermanent(reason),
            Err(err) => Outcome::Requeued(err.to_string()),
        }
    }

    /// One forced refresh, one repeat of the create call. A second
    /// `AuthExpired` means the handle is genuinely rejected server-side;
    /// redelivery gets a later chance.
    async fn retry_with_fresh_token(&self, alarm: &chime_domain::AlarmDescriptor) -> Outcome {
        let token = match self.credentials.refresh_access_token().await {
            Ok(token) => token,
            Err(err) => return Outcome::AuthFailure(err),
        };

        match self.sink.create_event(&token, alarm).await {
            Ok(event) => Outcome::Created(event),
            Err(SinkError::InvalidRequest(reason)) => Outcome::RejectedPermanent(reason),
            Err(err) => Outcome::Requeued(err.to_string()),
        }
    }
}
