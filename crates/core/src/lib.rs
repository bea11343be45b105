//! # Chime Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The alarm message decoder
//! - Port/adapter interfaces (traits) for the event sink and credential source
//! - The per-message processing state machine
//!
//! ## Architecture Principles
//! - Only depends on `chime-domain`
//! - No queue, HTTP, or filesystem code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod consumer;
pub mod decode;
pub mod ports;

pub use consumer::{AlarmProcessor, Disposition, Outcome};
pub use decode::AlarmDecoder;
pub use ports::{CredentialSource, EventSink};
