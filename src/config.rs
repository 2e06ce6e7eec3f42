// Configuration loading. The config is a small JSON file holding the API
// credentials plus a few optional knobs; it is read once at startup and never
// changes during a run.

use crate::error::{Result, SchedulerError};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://open.tiktokapis.com/v2";
pub const DEFAULT_INPUT_FILE: &str = "videos.csv";
pub const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "tiktok-bulk-scheduler";
const BASE_URL_ENV: &str = "TIKTOK_API_BASE_URL";

const DEFAULT_DELAY_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// On-disk shape of `config.json`. Every field is optional here so that
/// missing credentials produce a configuration error instead of a serde one.
#[derive(Deserialize, Debug, Default)]
struct RawConfig {
    client_key: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    input_file: Option<PathBuf>,
    api_base_url: Option<String>,
    schedule_utc_offset: Option<String>,
    delay_seconds: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Clone)]
pub struct Config {
    pub client_key: String,
    pub client_secret: String,
    pub access_token: String,
    pub input_file: PathBuf,
    pub api_base_url: String,
    /// Offset used to turn naive schedule times into instants.
    pub schedule_offset: FixedOffset,
    /// Pause between consecutive jobs.
    pub job_delay: Duration,
    pub request_timeout: Duration,
}

// Keep the secrets out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_key", &self.client_key)
            .field("input_file", &self.input_file)
            .field("api_base_url", &self.api_base_url)
            .field("schedule_offset", &self.schedule_offset)
            .field("job_delay", &self.job_delay)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load the config from `explicit` if given, otherwise from the first
    /// existing default location (see [`default_locations`]).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => default_locations()
                .into_iter()
                .find(|p| p.exists())
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
        };
        let mut config = Self::from_file(&path)?;
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().to_string();
            }
        }
        debug!(?config, path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SchedulerError::configuration(format!(
                "Configuration file not found: {}. Please create it using config.json.example",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| SchedulerError::configuration(format!("Invalid config JSON: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let (client_key, client_secret, access_token) = match (
            non_empty(raw.client_key),
            non_empty(raw.client_secret),
            non_empty(raw.access_token),
        ) {
            (Some(k), Some(s), Some(t)) => (k, s, t),
            _ => {
                return Err(SchedulerError::configuration(
                    "Missing required configuration: client_key, client_secret, or access_token",
                ))
            }
        };

        let schedule_offset = match raw.schedule_utc_offset.as_deref().map(str::trim) {
            None | Some("") => utc(),
            Some(s) => parse_utc_offset(s).ok_or_else(|| {
                SchedulerError::configuration(format!(
                    "Invalid schedule_utc_offset: {}. Use '+HH:MM' or '-HH:MM'",
                    s
                ))
            })?,
        };

        Ok(Config {
            client_key,
            client_secret,
            access_token,
            input_file: raw
                .input_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_FILE)),
            api_base_url: non_empty(raw.api_base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            schedule_offset,
            job_delay: Duration::from_secs(raw.delay_seconds.unwrap_or(DEFAULT_DELAY_SECS)),
            request_timeout: Duration::from_secs(
                raw.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }
}

/// Candidate config paths, in lookup order: the working directory, then the
/// platform config directory.
pub fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse `+HH:MM` / `-HH:MM` (the colon is optional).
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_json(
            r#"{"client_key":"k","client_secret":"s","access_token":"t"}"#,
        )
        .unwrap();
        assert_eq!(config.access_token, "t");
        assert_eq!(config.input_file, PathBuf::from("videos.csv"));
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.schedule_offset, utc());
        assert_eq!(config.job_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let err = Config::from_json(r#"{"client_key":"k","client_secret":"s"}"#).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
        assert!(err.to_string().contains("access_token"));

        let err = Config::from_json(r#"{"client_key":"","client_secret":"s","access_token":"t"}"#)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    #[test]
    fn test_optional_keys() {
        let config = Config::from_json(
            r#"{
                "client_key": "k",
                "client_secret": "s",
                "access_token": "t",
                "input_file": "batch.json",
                "api_base_url": "http://localhost:9000",
                "schedule_utc_offset": "+02:00",
                "delay_seconds": 0
            }"#,
        )
        .unwrap();
        assert_eq!(config.input_file, PathBuf::from("batch.json"));
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.schedule_offset.local_minus_utc(), 2 * 3600);
        assert_eq!(config.job_delay, Duration::ZERO);
    }

    #[test]
    fn test_bad_offset_rejected() {
        let err = Config::from_json(
            r#"{"client_key":"k","client_secret":"s","access_token":"t","schedule_utc_offset":"CET"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("CET"));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+00:00"), Some(utc()));
        assert_eq!(parse_utc_offset("-05:30").map(|o| o.local_minus_utc()), Some(-19_800));
        assert_eq!(parse_utc_offset("+0100").map(|o| o.local_minus_utc()), Some(3_600));
        assert_eq!(parse_utc_offset("01:00"), None);
        assert_eq!(parse_utc_offset("+01:75"), None);
        assert_eq!(parse_utc_offset("+"), None);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config::from_json(
            r#"{"client_key":"k","client_secret":"very-secret","access_token":"tok-123"}"#,
        )
        .unwrap();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("tok-123"));
    }
}
