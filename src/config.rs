use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://fitness.db";
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Service settings that live outside Rocket's own figment (`ROCKET_*`).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub history_limit: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let history_limit = parse_var("HISTORY_LIMIT", defaults.history_limit)?;
        if !(1..=MAX_HISTORY_LIMIT).contains(&history_limit) {
            return Err(ConfigError::Invalid {
                name: "HISTORY_LIMIT",
                value: history_limit.to_string(),
            });
        }

        Ok(Self {
            database_url: dotenvy::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            busy_timeout_secs: parse_var("DATABASE_BUSY_TIMEOUT_SECS", defaults.busy_timeout_secs)?,
            history_limit,
        })
    }

    /// Requested page sizes are clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn history_limit_for(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.history_limit)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match dotenvy::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
