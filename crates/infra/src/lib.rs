//! # Chime Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The lapin-backed queue consumer and publisher
//! - The Google Calendar event sink (reqwest)
//! - The Google OAuth credential source with file persistence
//! - The configuration loader
//!
//! ## Architecture
//! - Implements traits defined in `chime-core`
//! - Depends on `chime-domain` and `chime-core`
//! - Contains all "impure" code (network, filesystem, operator I/O)

pub mod config;
pub mod google;
pub mod queue;

// Re-export commonly used items
pub use google::auth::{AuthorizationPrompt, GoogleCredentialSource, StdinPrompt, StoredTokens};
pub use google::sink::GoogleCalendarSink;
pub use queue::consumer::QueueConsumer;
pub use queue::publisher::AlarmPublisher;
