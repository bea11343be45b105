//! Google Calendar event sink
//!
//! Performs exactly one `events.insert` call per invocation. Retrying is the
//! queue consumer's job, so no retry happens here; the error variant tells the
//! consumer how to respond.

use std::time::Duration;

use async_trait::async_trait;
use chime_core::EventSink;
use chime_domain::constants::DEFAULT_EVENT_TITLE;
use chime_domain::{AlarmDescriptor, BridgeError, CalendarConfig, EventRef, Result, SinkError};
use chrono::offset::LocalResult;
use chrono::TimeZone;
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Google Calendar insert-event client.
pub struct GoogleCalendarSink {
    client: Client,
    config: CalendarConfig,
    zone: Tz,
}

impl GoogleCalendarSink {
    /// Build a sink from calendar configuration.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` for an unparseable time zone.
    pub fn new(config: CalendarConfig) -> Result<Self> {
        let zone: Tz = config
            .time_zone
            .parse()
            .map_err(|_| BridgeError::Config(format!("invalid time zone: {}", config.time_zone)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config, zone })
    }

    /// Reference zone events are scheduled in.
    pub fn zone(&self) -> Tz {
        self.zone
    }

    fn build_event(&self, alarm: &AlarmDescriptor) -> std::result::Result<EventBody, SinkError> {
        let local = alarm.date.and_time(alarm.time);
        let start = match self.zone.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            // DST fold: take the earlier instant.
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                return Err(SinkError::InvalidRequest(format!(
                    "{local} does not exist in zone {}",
                    self.zone.name()
                )))
            }
        };
        let end = start + chrono::Duration::minutes(self.config.event_duration_minutes);

        let summary = if alarm.label.trim().is_empty() {
            DEFAULT_EVENT_TITLE.to_string()
        } else {
            alarm.label.clone()
        };

        let recurrence = if alarm.repeat_weekly {
            let days: Vec<&str> = alarm.days_of_week.iter().map(|d| d.as_str()).collect();
            Some(vec![format!("RRULE:FREQ=WEEKLY;BYDAY={}", days.join(","))])
        } else {
            None
        };

        Ok(EventBody {
            summary,
            start: EventTime {
                date_time: start.to_rfc3339(),
                time_zone: self.zone.name().to_string(),
            },
            end: EventTime {
                date_time: end.to_rfc3339(),
                time_zone: self.zone.name().to_string(),
            },
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup".to_string(),
                    minutes: self.config.reminder_lead_minutes,
                }],
            },
            recurrence,
        })
    }
}

#[async_trait]
impl EventSink for GoogleCalendarSink {
    async fn create_event(
        &self,
        access_token: &str,
        alarm: &AlarmDescriptor,
    ) -> std::result::Result<EventRef, SinkError> {
        let url =
            format!("{}/calendars/{}/events", self.config.api_base, self.config.calendar_id);
        let body = self.build_event(alarm)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Unavailable("insert request timed out".to_string())
                } else {
                    SinkError::Unavailable(format!("insert request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let created: InsertedEvent = response.json().await.map_err(|e| {
                SinkError::Unavailable(format!("unreadable insert response: {e}"))
            })?;
            debug!(event_id = %created.id, "calendar event inserted");
            return Ok(EventRef { id: created.id, html_link: created.html_link });
        }

        let error_text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
        Err(classify_failure(status, &error_text))
    }
}

/// Map an insert-event HTTP failure onto the sink error taxonomy.
///
/// Google reports quota exhaustion as 403 with a rate/quota reason, the same
/// status it uses for revoked access; the body disambiguates.
fn classify_failure(status: StatusCode, body: &str) -> SinkError {
    match status {
        StatusCode::UNAUTHORIZED => SinkError::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => SinkError::RateLimited,
        StatusCode::FORBIDDEN => {
            let lowered = body.to_ascii_lowercase();
            if lowered.contains("rate") || lowered.contains("quota") {
                SinkError::RateLimited
            } else {
                SinkError::InvalidRequest(format!("{status}: {body}"))
            }
        }
        status if status.is_client_error() => {
            SinkError::InvalidRequest(format!("{status}: {body}"))
        }
        status => SinkError::Unavailable(format!("{status}: {body}")),
    }
}

#[derive(Debug, Serialize)]
struct EventBody {
    summary: String,
    start: EventTime,
    end: EventTime,
    reminders: Reminders,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurrence: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct Reminders {
    #[serde(rename = "useDefault")]
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: String,
    minutes: i64,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use chime_domain::WeekdayCode;
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn sink() -> GoogleCalendarSink {
        GoogleCalendarSink::new(CalendarConfig::default()).unwrap()
    }

    fn alarm(label: &str) -> AlarmDescriptor {
        AlarmDescriptor {
            time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 4, 18).unwrap(),
            repeat_weekly: false,
            days_of_week: Vec::new(),
            label: label.to_string(),
        }
    }

    #[test]
    fn event_end_is_start_plus_duration() {
        let body = sink().build_event(&alarm("Wake up")).unwrap();
        assert_eq!(body.start.date_time, "2025-04-18T07:00:00-03:00");
        assert_eq!(body.end.date_time, "2025-04-18T07:15:00-03:00");
        assert_eq!(body.start.time_zone, "America/Sao_Paulo");
    }

    #[test]
    fn single_occurrence_has_no_recurrence_rule() {
        let body = sink().build_event(&alarm("Wake up")).unwrap();
        assert!(body.recurrence.is_none());
    }

    #[test]
    fn weekly_repeat_builds_byday_rule() {
        let mut weekly = alarm("Gym");
        weekly.repeat_weekly = true;
        weekly.days_of_week = vec![WeekdayCode::Monday, WeekdayCode::Wednesday];

        let body = sink().build_event(&weekly).unwrap();
        assert_eq!(
            body.recurrence,
            Some(vec!["RRULE:FREQ=WEEKLY;BYDAY=MO,WE".to_string()])
        );
    }

    #[test]
    fn blank_label_falls_back_to_placeholder() {
        let body = sink().build_event(&alarm("   ")).unwrap();
        assert_eq!(body.summary, DEFAULT_EVENT_TITLE);

        let body = sink().build_event(&alarm("Wake up")).unwrap();
        assert_eq!(body.summary, "Wake up");
    }

    #[test]
    fn reminder_fires_at_event_start() {
        let body = sink().build_event(&alarm("Wake up")).unwrap();
        assert!(!body.reminders.use_default);
        assert_eq!(body.reminders.overrides.len(), 1);
        assert_eq!(body.reminders.overrides[0].method, "popup");
        assert_eq!(body.reminders.overrides[0].minutes, 0);
    }

    #[test]
    fn failure_classification_matches_taxonomy() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, ""),
            SinkError::AuthExpired
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            SinkError::RateLimited
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, r#"{"reason":"rateLimitExceeded"}"#),
            SinkError::RateLimited
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, r#"{"reason":"insufficientPermissions"}"#),
            SinkError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "bad time"),
            SinkError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, ""),
            SinkError::Unavailable(_)
        ));
    }

    #[test]
    fn rejects_invalid_time_zone_config() {
        let config =
            CalendarConfig { time_zone: "Nowhere/Nope".to_string(), ..CalendarConfig::default() };
        assert!(matches!(GoogleCalendarSink::new(config), Err(BridgeError::Config(_))));
    }
}
