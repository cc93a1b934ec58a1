//! Engine configuration, read from `DISPATCH_*` environment variables.
//!
//! The engine never reads `.env` files itself. Binaries that want that should call `dotenvy::dotenv()` before
//! [`EngineConfig::from_env_or_default`].
use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use dispatch_common::helpers::parse_boolean_flag;
use log::*;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/dispatch.db";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const DEFAULT_EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value ({value}). {reason}")]
    InvalidValue { var: String, value: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// Create the database file if it does not exist yet
    pub create_database: bool,
    /// Capacity of the notification channel
    pub event_buffer_size: usize,
    /// Maximum time an order may wait in `Offered` before it is retired. `None` lets orders wait indefinitely.
    pub offer_ttl: Option<Duration>,
    /// How often the offer expiry worker runs. Irrelevant if `offer_ttl` is `None`.
    pub expiry_interval: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            create_database: false,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            offer_ttl: None,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the environment. Invalid values are logged and replaced with their default.
    pub fn from_env_or_default() -> Self {
        match Self::load(|v| env::var(v).ok(), false) {
            Ok(config) => config,
            Err(e) => {
                error!("🪛️ Could not load the engine configuration. {e}. Using the defaults.");
                Self::default()
            },
        }
    }

    /// Reads the configuration from the environment, failing on the first invalid value.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::load(|v| env::var(v).ok(), true)
    }

    fn load<F>(lookup: F, strict: bool) -> Result<Self, ConfigError>
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let database_url = lookup("DISPATCH_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ DISPATCH_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            defaults.database_url.clone()
        });
        let max_db_connections =
            read_var::<u32, _>(&lookup, "DISPATCH_MAX_DB_CONNECTIONS", strict)?.unwrap_or(defaults.max_db_connections);
        let create_database = parse_boolean_flag(lookup("DISPATCH_CREATE_DATABASE"), defaults.create_database);
        let event_buffer_size =
            read_var::<usize, _>(&lookup, "DISPATCH_EVENT_BUFFER_SIZE", strict)?.unwrap_or(defaults.event_buffer_size);
        let offer_ttl = read_var::<i64, _>(&lookup, "DISPATCH_OFFER_TTL_MINS", strict)?.and_then(|mins| {
            if mins > 0 {
                Some(Duration::minutes(mins))
            } else {
                info!("🪛️ DISPATCH_OFFER_TTL_MINS is {mins}. Offers will not time out.");
                None
            }
        });
        let expiry_interval = read_var::<u64, _>(&lookup, "DISPATCH_EXPIRY_INTERVAL_SECS", strict)?
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
            .unwrap_or(defaults.expiry_interval);
        Ok(Self { database_url, max_db_connections, create_database, event_buffer_size, offer_ttl, expiry_interval })
    }
}

/// Reads and parses `var`. In lenient mode an unparseable value is logged and treated as unset.
fn read_var<T, F>(lookup: &F, var: &str, strict: bool) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<T>() {
        Ok(v) => Ok(Some(v)),
        Err(e) if strict => Err(ConfigError::InvalidValue { var: var.to_string(), value, reason: e.to_string() }),
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {var} ({value}). {e} Using the default instead.");
            Ok(None)
        },
    }
}
