//! Configuration types, built once from environment variables.
//!
//! Each section reads through a lookup function so tests can supply a map
//! instead of mutating the process environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Variable lookup: `Some(value)` when set.
pub trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

/// Lookup against the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional(lookup: &impl Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(lookup: &impl Lookup, key: &str) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Lookup,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Where the two tables live.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub input_table: String,
    pub status_table: String,
}

impl StoreConfig {
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: optional(lookup, "LEADS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/leads.db")),
            input_table: optional(lookup, "LEADS_INPUT_TABLE").unwrap_or_else(|| "leads".into()),
            status_table: optional(lookup, "LEADS_STATUS_TABLE")
                .unwrap_or_else(|| "lead_status".into()),
        })
    }
}

// ── Schedule ────────────────────────────────────────────────────────

/// Reference timezone and follow-up window.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    pub followup_window_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Warsaw,
            followup_window_days: 3,
        }
    }
}

impl ScheduleConfig {
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timezone = match optional(lookup, "LEADS_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
                key: "LEADS_TIMEZONE".into(),
                message: e.to_string(),
            })?,
            None => defaults.timezone,
        };
        let followup_window_days =
            parse_or(lookup, "FOLLOWUP_WINDOW_DAYS", defaults.followup_window_days)?;
        if followup_window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FOLLOWUP_WINDOW_DAYS".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            timezone,
            followup_window_days,
        })
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Outbound mail relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_email: String,
    pub from_name: Option<String>,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        Ok(Self {
            host: require(lookup, "SMTP_HOST")?,
            port: parse_or(lookup, "SMTP_PORT", 587)?,
            username: require(lookup, "SMTP_USER")?,
            password: SecretString::from(require(lookup, "SMTP_PASS")?),
            from_email: require(lookup, "SMTP_FROM_EMAIL")?,
            from_name: optional(lookup, "SMTP_FROM_NAME"),
            timeout: Duration::from_secs(parse_or(lookup, "SMTP_TIMEOUT_SECS", 30)?),
        })
    }
}

// ── Message ─────────────────────────────────────────────────────────

/// Attachment variables, in the order the files are attached.
pub const ATTACHMENT_KEYS: [&str; 3] = ["ATTACHMENT_A", "ATTACHMENT_B", "ATTACHMENT_C"];

/// Content shared by every acknowledgement.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    pub calendar_link: String,
    pub attachments: Vec<PathBuf>,
}

impl MessageConfig {
    /// Reads the calendar link and attachment paths; every attachment must
    /// exist as a file.
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let calendar_link = require(lookup, "CALENDAR_LINK")?;
        let mut attachments = Vec::with_capacity(ATTACHMENT_KEYS.len());
        for key in ATTACHMENT_KEYS {
            let path = PathBuf::from(require(lookup, key)?);
            if !path.is_file() {
                return Err(ConfigError::AttachmentNotFound {
                    key: key.to_string(),
                    path,
                });
            }
            attachments.push(path);
        }
        Ok(Self {
            calendar_link,
            attachments,
        })
    }
}

// ── App ─────────────────────────────────────────────────────────────

/// Everything the acknowledgement pass needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_env: String,
    pub store: StoreConfig,
    pub schedule: ScheduleConfig,
    pub smtp: SmtpConfig,
    pub message: MessageConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        Ok(Self {
            app_env: app_env(lookup),
            store: StoreConfig::from_lookup(lookup)?,
            schedule: ScheduleConfig::from_lookup(lookup)?,
            smtp: SmtpConfig::from_lookup(lookup)?,
            message: MessageConfig::from_lookup(lookup)?,
        })
    }
}

/// The subset the follow-up scan needs; no mail settings.
#[derive(Debug, Clone)]
pub struct FollowupConfig {
    pub app_env: String,
    pub store: StoreConfig,
    pub schedule: ScheduleConfig,
}

impl FollowupConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        Ok(Self {
            app_env: app_env(lookup),
            store: StoreConfig::from_lookup(lookup)?,
            schedule: ScheduleConfig::from_lookup(lookup)?,
        })
    }
}

fn app_env(lookup: &impl Lookup) -> String {
    optional(lookup, "APP_ENV").unwrap_or_else(|| "local".into())
}

/// Directory for the daily log file, if file logging is enabled.
///
/// Read before the rest of the configuration so logging is up first.
pub fn log_dir(lookup: &impl Lookup) -> Option<PathBuf> {
    optional(lookup, "LEADS_LOG_DIR").map(PathBuf::from)
}
