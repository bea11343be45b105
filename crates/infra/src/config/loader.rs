//! Configuration loader
//!
//! Loads application configuration from an optional file with environment
//! overrides.
//!
//! ## Loading Strategy
//! 1. Starts from built-in defaults (every option except the OAuth client
//!    credentials has one)
//! 2. Overlays a config file when one is found (JSON or TOML, detected by
//!    extension)
//! 3. Applies environment variable overrides last
//!
//! ## Environment Variables
//! - `CHIME_QUEUE_PROTOCOL`, `CHIME_QUEUE_HOST`, `CHIME_QUEUE_PORT`,
//!   `CHIME_QUEUE_USER`, `CHIME_QUEUE_PASS`, `CHIME_QUEUE_VHOST`,
//!   `CHIME_QUEUE_NAME`, `CHIME_QUEUE_PREFETCH`, `CHIME_DELIVERY_LIMIT`
//! - `CHIME_CALENDAR_ID`, `CHIME_TIME_ZONE`, `CHIME_EVENT_DURATION_MINUTES`,
//!   `CHIME_REMINDER_LEAD_MINUTES`
//! - `CHIME_GOOGLE_CLIENT_ID`, `CHIME_GOOGLE_CLIENT_SECRET`,
//!   `CHIME_TOKEN_PATH`
//!
//! ## File Locations
//! The loader probes `./config.{json,toml}` and `./chime.{json,toml}` in the
//! working directory and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chime_domain::{BridgeError, Config, Result};
use chrono_tz::Tz;

/// Load configuration: defaults, then file (if any), then env overrides.
///
/// # Errors
/// Returns `BridgeError::Config` if the file or an override is invalid.
pub fn load() -> Result<Config> {
    let mut config = match probe_config_paths() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration from file");
            load_from_file(&path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a specific file.
///
/// Format is detected by extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `BridgeError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BridgeError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BridgeError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(BridgeError::Config(format!("Unsupported config format: {}", extension))),
    }
}

fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("chime.json"),
            cwd.join("chime.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("chime.json"),
                exe_dir.join("chime.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    override_string("CHIME_QUEUE_PROTOCOL", &mut config.queue.protocol);
    override_string("CHIME_QUEUE_HOST", &mut config.queue.host);
    override_parsed("CHIME_QUEUE_PORT", &mut config.queue.port)?;
    override_string("CHIME_QUEUE_USER", &mut config.queue.username);
    override_string("CHIME_QUEUE_PASS", &mut config.queue.password);
    override_string("CHIME_QUEUE_VHOST", &mut config.queue.vhost);
    override_string("CHIME_QUEUE_NAME", &mut config.queue.queue);
    override_parsed("CHIME_QUEUE_PREFETCH", &mut config.queue.prefetch)?;
    override_parsed("CHIME_DELIVERY_LIMIT", &mut config.queue.delivery_limit)?;

    override_string("CHIME_CALENDAR_ID", &mut config.calendar.calendar_id);
    override_string("CHIME_TIME_ZONE", &mut config.calendar.time_zone);
    override_parsed("CHIME_EVENT_DURATION_MINUTES", &mut config.calendar.event_duration_minutes)?;
    override_parsed("CHIME_REMINDER_LEAD_MINUTES", &mut config.calendar.reminder_lead_minutes)?;

    override_string("CHIME_GOOGLE_CLIENT_ID", &mut config.auth.client_id);
    override_string("CHIME_GOOGLE_CLIENT_SECRET", &mut config.auth.client_secret);
    override_string("CHIME_TOKEN_PATH", &mut config.auth.token_path);

    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    Tz::from_str(&config.calendar.time_zone).map_err(|_| {
        BridgeError::Config(format!("Invalid time zone: {}", config.calendar.time_zone))
    })?;

    if config.calendar.event_duration_minutes <= 0 {
        return Err(BridgeError::Config(format!(
            "Event duration must be positive, got {}",
            config.calendar.event_duration_minutes
        )));
    }

    if config.calendar.reminder_lead_minutes < 0 {
        return Err(BridgeError::Config(format!(
            "Reminder lead time cannot be negative, got {}",
            config.calendar.reminder_lead_minutes
        )));
    }

    Ok(())
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(key) {
        *target = value
            .parse::<T>()
            .map_err(|e| BridgeError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const OVERRIDE_VARS: &[&str] = &[
        "CHIME_QUEUE_PROTOCOL",
        "CHIME_QUEUE_HOST",
        "CHIME_QUEUE_PORT",
        "CHIME_QUEUE_USER",
        "CHIME_QUEUE_PASS",
        "CHIME_QUEUE_VHOST",
        "CHIME_QUEUE_NAME",
        "CHIME_QUEUE_PREFETCH",
        "CHIME_DELIVERY_LIMIT",
        "CHIME_CALENDAR_ID",
        "CHIME_TIME_ZONE",
        "CHIME_EVENT_DURATION_MINUTES",
        "CHIME_REMINDER_LEAD_MINUTES",
        "CHIME_GOOGLE_CLIENT_ID",
        "CHIME_GOOGLE_CLIENT_SECRET",
        "CHIME_TOKEN_PATH",
    ];

    fn clear_overrides() {
        for var in OVERRIDE_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults_apply_without_env_or_file() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        validate(&config).unwrap();

        assert_eq!(config.queue.host, "localhost");
        assert_eq!(config.queue.port, 5672);
        assert_eq!(config.queue.queue, "set_alarm");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        std::env::set_var("CHIME_QUEUE_HOST", "broker.internal");
        std::env::set_var("CHIME_QUEUE_PORT", "5671");
        std::env::set_var("CHIME_TIME_ZONE", "UTC");
        std::env::set_var("CHIME_EVENT_DURATION_MINUTES", "30");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        validate(&config).unwrap();

        assert_eq!(config.queue.host, "broker.internal");
        assert_eq!(config.queue.port, 5671);
        assert_eq!(config.calendar.time_zone, "UTC");
        assert_eq!(config.calendar.event_duration_minutes, 30);

        clear_overrides();
    }

    #[test]
    fn invalid_numeric_override_is_a_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        std::env::set_var("CHIME_QUEUE_PORT", "not-a-number");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        assert!(matches!(result, Err(BridgeError::Config(_))));

        clear_overrides();
    }

    #[test]
    fn invalid_time_zone_is_rejected() {
        let mut config = Config::default();
        config.calendar.time_zone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(validate(&config), Err(BridgeError::Config(_))));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut config = Config::default();
        config.calendar.event_duration_minutes = 0;
        assert!(matches!(validate(&config), Err(BridgeError::Config(_))));
    }

    #[test]
    fn loads_toml_config_file() {
        let toml_content = r#"
[queue]
host = "rabbit.example"
queue = "alarms"

[calendar]
time_zone = "America/Recife"

[auth]
client_id = "cid"
client_secret = "secret"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.queue.host, "rabbit.example");
        assert_eq!(config.queue.queue, "alarms");
        assert_eq!(config.queue.port, 5672);
        assert_eq!(config.calendar.time_zone, "America/Recife");
        assert_eq!(config.auth.client_id, "cid");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_json_config_file() {
        let json_content = r#"{
            "queue": { "host": "rabbit.example", "port": 5671 },
            "auth": { "client_id": "cid", "client_secret": "secret" }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.queue.host, "rabbit.example");
        assert_eq!(config.queue.port, 5671);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_unsupported_config_format() {
        let path = PathBuf::from("config.yaml");
        let result = parse_config("queue: {}", &path);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }
}
