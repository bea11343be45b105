//! Alarm message decoding and validation
//!
//! Queue payloads are untrusted bytes. The decoder parses them as strict
//! structured data (JSON records only), validates every field, and produces an
//! immutable [`AlarmDescriptor`]. Payload content never gains control-flow
//! influence beyond field extraction.

use chrono::offset::LocalResult;
use chrono::{NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use chime_domain::constants::{DATE_FORMAT, DEFAULT_EVENT_TITLE, TIME_FORMAT};
use chime_domain::{AlarmDescriptor, AlarmMessage, DecodeError, WeekdayCode};

/// Pure payload-to-descriptor decoder, pinned to the reference time zone the
/// resulting events will be scheduled in.
#[derive(Debug, Clone)]
pub struct AlarmDecoder {
    zone: Tz,
}

impl AlarmDecoder {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Reference zone used for timestamp validation.
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Decode and validate an opaque payload.
    ///
    /// # Errors
    /// Returns [`DecodeError`] for empty payloads, non-record payloads,
    /// missing or unparseable `time`/`date`, timestamps that do not resolve in
    /// the reference zone, and weekly repeats with empty or invalid weekdays.
    pub fn decode(&self, payload: &[u8]) -> Result<AlarmDescriptor, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        let message: AlarmMessage = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        self.from_message(message)
    }

    /// Validate an already-parsed wire record.
    pub fn from_message(&self, message: AlarmMessage) -> Result<AlarmDescriptor, DecodeError> {
        let time = NaiveTime::parse_from_str(&message.time, TIME_FORMAT)
            .map_err(|_| DecodeError::InvalidTime(message.time.clone()))?;
        let date = NaiveDate::parse_from_str(&message.date, DATE_FORMAT)
            .map_err(|_| DecodeError::InvalidDate(message.date.clone()))?;

        // The instant must exist in the reference zone. Ambiguous local times
        // (DST fold) resolve to the earlier instant downstream; nonexistent
        // ones are rejected here.
        if let LocalResult::None = self.zone.from_local_datetime(&date.and_time(time)) {
            return Err(DecodeError::InvalidTimestamp {
                zone: self.zone.name().to_string(),
                value: format!("{} {}", message.date, message.time),
            });
        }

        let days_of_week = if message.repeat {
            if message.days.is_empty() {
                return Err(DecodeError::EmptyRecurrence);
            }
            message
                .days
                .iter()
                .map(|d| d.parse::<WeekdayCode>().map_err(DecodeError::InvalidWeekday))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            // Ignored without recurrence.
            Vec::new()
        };

        let label = match message.label {
            Some(label) if !label.trim().is_empty() => label,
            _ => DEFAULT_EVENT_TITLE.to_string(),
        };

        Ok(AlarmDescriptor { time, date, repeat_weekly: message.repeat, days_of_week, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> AlarmDecoder {
        AlarmDecoder::new(chrono_tz::America::Sao_Paulo)
    }

    #[test]
    fn decodes_single_occurrence_alarm() {
        let payload =
            br#"{"time":"07:00","date":"2025-04-18","repeat":false,"days":[],"label":"Wake up"}"#;
        let alarm = decoder().decode(payload).unwrap();

        assert_eq!(alarm.time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(alarm.date, NaiveDate::from_ymd_opt(2025, 4, 18).unwrap());
        assert!(!alarm.repeat_weekly);
        assert!(alarm.days_of_week.is_empty());
        assert_eq!(alarm.label, "Wake up");
    }

    #[test]
    fn round_trips_well_formed_payloads() {
        let original = AlarmMessage {
            time: "06:30".to_string(),
            date: "2025-05-01".to_string(),
            repeat: true,
            days: vec!["MO".to_string(), "WE".to_string()],
            label: Some("Gym".to_string()),
        };
        let payload = serde_json::to_vec(&original).unwrap();

        let alarm = decoder().decode(&payload).unwrap();
        assert_eq!(alarm.to_message(), original);
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(decoder().decode(b""), Err(DecodeError::Empty));
    }

    #[test]
    fn rejects_non_record_payloads() {
        assert!(matches!(decoder().decode(b"not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decoder().decode(b"42"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decoder().decode(b"[1,2,3]"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn rejects_missing_time_or_date() {
        assert!(matches!(
            decoder().decode(br#"{"date":"2025-04-18"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder().decode(br#"{"time":"07:00"}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_unparseable_time_and_date() {
        assert_eq!(
            decoder().decode(br#"{"time":"25:99","date":"2025-04-18"}"#),
            Err(DecodeError::InvalidTime("25:99".to_string()))
        );
        assert_eq!(
            decoder().decode(br#"{"time":"07:00","date":"2025-13-40"}"#),
            Err(DecodeError::InvalidDate("2025-13-40".to_string()))
        );
    }

    #[test]
    fn rejects_weekly_repeat_without_days() {
        let payload = br#"{"time":"07:00","date":"2025-04-18","repeat":true,"days":[]}"#;
        assert_eq!(decoder().decode(payload), Err(DecodeError::EmptyRecurrence));
    }

    #[test]
    fn rejects_invalid_weekday_codes() {
        let payload = br#"{"time":"07:00","date":"2025-04-18","repeat":true,"days":["MO","XX"]}"#;
        assert_eq!(decoder().decode(payload), Err(DecodeError::InvalidWeekday("XX".to_string())));
    }

    #[test]
    fn keeps_requested_weekdays_in_order() {
        let payload = br#"{"time":"07:00","date":"2025-04-18","repeat":true,"days":["MO","WE"]}"#;
        let alarm = decoder().decode(payload).unwrap();
        assert_eq!(alarm.days_of_week, vec![WeekdayCode::Monday, WeekdayCode::Wednesday]);
    }

    #[test]
    fn ignores_days_without_repeat() {
        let payload = br#"{"time":"07:00","date":"2025-04-18","repeat":false,"days":["MO"]}"#;
        let alarm = decoder().decode(payload).unwrap();
        assert!(alarm.days_of_week.is_empty());
    }

    #[test]
    fn defaults_blank_or_missing_label() {
        let blank = br#"{"time":"07:00","date":"2025-04-18","label":"   "}"#;
        assert_eq!(decoder().decode(blank).unwrap().label, DEFAULT_EVENT_TITLE);

        let missing = br#"{"time":"07:00","date":"2025-04-18"}"#;
        assert_eq!(decoder().decode(missing).unwrap().label, DEFAULT_EVENT_TITLE);
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // 2017-10-15 00:00 did not exist in Sao Paulo: clocks jumped from
        // 00:00 to 01:00 for DST that night.
        let payload = br#"{"time":"00:00","date":"2017-10-15"}"#;
        assert!(matches!(
            decoder().decode(payload),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
    }
}
