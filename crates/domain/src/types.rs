//! Common data types used throughout the bridge

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::constants::{DATE_FORMAT, TIME_FORMAT};

/// Weekday codes as used in weekly recurrence rules (RRULE BYDAY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeekdayCode {
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl WeekdayCode {
    /// Two-letter recurrence-rule code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }
}

impl std::str::FromStr for WeekdayCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MO" => Ok(Self::Monday),
            "TU" => Ok(Self::Tuesday),
            "WE" => Ok(Self::Wednesday),
            "TH" => Ok(Self::Thursday),
            "FR" => Ok(Self::Friday),
            "SA" => Ok(Self::Saturday),
            "SU" => Ok(Self::Sunday),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for WeekdayCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-level alarm record as published to the queue.
///
/// `time` and `date` are required; everything else defaults. This is the
/// contract shared by the producer utility and the decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlarmMessage {
    pub time: String,
    pub date: String,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Validated, normalized representation of a requested calendar event.
///
/// Immutable once decoded; lives for a single message-processing cycle and is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDescriptor {
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub repeat_weekly: bool,
    pub days_of_week: Vec<WeekdayCode>,
    pub label: String,
}

impl AlarmDescriptor {
    /// Re-encode the descriptor into its wire record. Round-trips with the
    /// decoder for well-formed payloads.
    pub fn to_message(&self) -> AlarmMessage {
        AlarmMessage {
            time: self.time.format(TIME_FORMAT).to_string(),
            date: self.date.format(DATE_FORMAT).to_string(),
            repeat: self.repeat_weekly,
            days: self.days_of_week.iter().map(|d| d.as_str().to_string()).collect(),
            label: Some(self.label.clone()),
        }
    }
}

/// Reference to an event created in the external calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub html_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_codes_parse_case_insensitively() {
        assert_eq!("mo".parse::<WeekdayCode>(), Ok(WeekdayCode::Monday));
        assert_eq!("SU".parse::<WeekdayCode>(), Ok(WeekdayCode::Sunday));
        assert_eq!(" we ".parse::<WeekdayCode>(), Ok(WeekdayCode::Wednesday));
        assert!("XX".parse::<WeekdayCode>().is_err());
    }

    #[test]
    fn alarm_message_defaults_optional_fields() {
        let msg: AlarmMessage =
            serde_json::from_str(r#"{"time":"07:00","date":"2025-04-18"}"#).unwrap();
        assert!(!msg.repeat);
        assert!(msg.days.is_empty());
        assert!(msg.label.is_none());
    }

    #[test]
    fn alarm_message_requires_time_and_date() {
        assert!(serde_json::from_str::<AlarmMessage>(r#"{"date":"2025-04-18"}"#).is_err());
        assert!(serde_json::from_str::<AlarmMessage>(r#"{"time":"07:00"}"#).is_err());
    }
}
