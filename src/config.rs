use std::path::PathBuf;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;

use crate::catalog::{parse_slots, SlotCatalog};

/// Everything the service needs before it can serve. Required settings
/// abort startup when absent; a half-configured process never binds.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub operator_username: String,
    pub operator_password: String,
    pub token_secret: String,
    pub allowed_origins: Vec<String>,
    pub reset_timezone: Tz,
    pub bind: String,
    pub port: u16,
    pub reset_time: NaiveTime,
    pub metrics_port: Option<u16>,
    pub catalog: SlotCatalog,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "missing required environment variable {name}")
            }
            ConfigError::Invalid { name, reason } => write!(f, "invalid {name}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name→value lookup. `from_env` feeds the process
    /// environment through this; tests feed a map.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(ConfigError::Missing(name)),
            }
        };

        let data_dir = PathBuf::from(required("SLOTBOOK_DATA_DIR")?);
        let operator_username = required("SLOTBOOK_OPERATOR_USERNAME")?;
        let operator_password = required("SLOTBOOK_OPERATOR_PASSWORD")?;
        let token_secret = required("SLOTBOOK_TOKEN_SECRET")?;

        let allowed_origins: Vec<String> = required("SLOTBOOK_ALLOWED_ORIGINS")?
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if allowed_origins.is_empty() {
            return Err(ConfigError::Missing("SLOTBOOK_ALLOWED_ORIGINS"));
        }

        let tz_name = required("SLOTBOOK_RESET_TIMEZONE")?;
        let reset_timezone: Tz = tz_name.parse().map_err(|e: chrono_tz::ParseError| ConfigError::Invalid {
            name: "SLOTBOOK_RESET_TIMEZONE",
            reason: e.to_string(),
        })?;

        let bind = lookup("SLOTBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("SLOTBOOK_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "SLOTBOOK_PORT",
                reason: format!("{raw} is not a port number"),
            })?,
            None => 4000,
        };
        let reset_time = match lookup("SLOTBOOK_RESET_TIME") {
            Some(raw) => {
                NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| ConfigError::Invalid {
                    name: "SLOTBOOK_RESET_TIME",
                    reason: format!("{raw} is not an HH:MM time"),
                })?
            }
            None => NaiveTime::MIN,
        };
        let metrics_port = lookup("SLOTBOOK_METRICS_PORT").and_then(|raw| raw.parse().ok());

        let reference = SlotCatalog::default();
        let weekday = match lookup("SLOTBOOK_WEEKDAY_SLOTS") {
            Some(raw) => parse_slots(&raw).map_err(|e| ConfigError::Invalid {
                name: "SLOTBOOK_WEEKDAY_SLOTS",
                reason: e.to_string(),
            })?,
            None => reference.slots_for(Weekday::Mon).to_vec(),
        };
        let weekend = match lookup("SLOTBOOK_WEEKEND_SLOTS") {
            Some(raw) => parse_slots(&raw).map_err(|e| ConfigError::Invalid {
                name: "SLOTBOOK_WEEKEND_SLOTS",
                reason: e.to_string(),
            })?,
            None => reference.slots_for(Weekday::Sat).to_vec(),
        };
        let catalog = SlotCatalog::new(weekday, weekend);

        Ok(Self {
            data_dir,
            operator_username,
            operator_password,
            token_secret,
            allowed_origins,
            reset_timezone,
            bind,
            port,
            reset_time,
            metrics_port,
            catalog,
        })
    }
}
