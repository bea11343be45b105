//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! bridge.

/// Title used when an alarm message arrives without a label.
pub const DEFAULT_EVENT_TITLE: &str = "Alarm";

/// Reference time zone events are scheduled in unless configured otherwise.
pub const DEFAULT_TIME_ZONE: &str = "America/Sao_Paulo";

/// Calendar that receives created events.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Fixed event length, in minutes.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 15;

/// Reminder lead time, in minutes (0 = fires at event start).
pub const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 0;

/// Durable work queue carrying alarm-creation requests.
pub const DEFAULT_QUEUE_NAME: &str = "set_alarm";

/// Broker-enforced cap on deliveries of a single message before it is
/// dead-lettered.
pub const DEFAULT_DELIVERY_LIMIT: u32 = 5;

// Wire format
pub const TIME_FORMAT: &str = "%H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
