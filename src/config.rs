//! Configuration module
//!
//! Loads configuration from environment variables.

use chrono::{FixedOffset, NaiveTime};
use std::env;

use crate::domain::loyalty::{LoyaltyTracker, DEFAULT_FREE_WASH_THRESHOLD};
use crate::domain::settings::{DEFAULT_LATE_CUTOFF, DEFAULT_UTC_OFFSET_HOURS};
use crate::domain::SettlementSettings;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub host: String,
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Rate limit: requests per minute per API key
    pub rate_limit_per_minute: u32,

    pub log_format: LogFormat,

    /// Apply migrations/ on startup
    pub run_migrations: bool,

    /// Washes per earned free wash
    pub loyalty_threshold: i32,

    /// Check-ins after this local time are late
    pub late_cutoff: NaiveTime,

    /// Shop time zone as a whole-hour UTC offset
    pub business_utc_offset_hours: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 3000)?;
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let rate_limit_per_minute = parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100)?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let run_migrations = parse_or(&lookup, "RUN_MIGRATIONS", true)?;

        let loyalty_threshold = parse_or(&lookup, "LOYALTY_THRESHOLD", DEFAULT_FREE_WASH_THRESHOLD)?;
        if loyalty_threshold <= 0 {
            return Err(ConfigError::InvalidValue("LOYALTY_THRESHOLD"));
        }

        let late_cutoff = match lookup("LATE_CUTOFF") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|_| ConfigError::InvalidValue("LATE_CUTOFF"))?,
            None => {
                let (hour, minute) = DEFAULT_LATE_CUTOFF;
                NaiveTime::from_hms_opt(hour, minute, 0)
                    .ok_or(ConfigError::InvalidValue("LATE_CUTOFF"))?
            }
        };

        let business_utc_offset_hours =
            parse_or(&lookup, "BUSINESS_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS)?;
        if !(-12..=14).contains(&business_utc_offset_hours) {
            return Err(ConfigError::InvalidValue("BUSINESS_UTC_OFFSET_HOURS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            rate_limit_per_minute,
            log_format,
            run_migrations,
            loyalty_threshold,
            late_cutoff,
            business_utc_offset_hours,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Business rules handed to the handlers
    pub fn settlement_settings(&self) -> Result<SettlementSettings, ConfigError> {
        let loyalty = LoyaltyTracker::new(self.loyalty_threshold)
            .map_err(|_| ConfigError::InvalidValue("LOYALTY_THRESHOLD"))?;
        let offset = FixedOffset::east_opt(self.business_utc_offset_hours * 3600)
            .ok_or(ConfigError::InvalidValue("BUSINESS_UTC_OFFSET_HOURS"))?;

        Ok(SettlementSettings::new(loyalty, self.late_cutoff, offset))
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/motowash")]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_per_minute, 100);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.run_migrations);
        assert!(!config.is_production());

        let settings = config.settlement_settings().unwrap();
        assert_eq!(settings, SettlementSettings::default());
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnv("DATABASE_URL"))));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/motowash"),
            ("LOG_FORMAT", "json"),
            ("LOYALTY_THRESHOLD", "10"),
            ("LATE_CUTOFF", "07:45"),
            ("BUSINESS_UTC_OFFSET_HOURS", "8"),
            ("RUN_MIGRATIONS", "false"),
        ])
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.run_migrations);

        let settings = config.settlement_settings().unwrap();
        assert_eq!(settings.loyalty.threshold(), 10);
        assert_eq!(settings.late_cutoff, NaiveTime::from_hms_opt(7, 45, 0).unwrap());
        assert_eq!(settings.business_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_invalid_values() {
        let base = ("DATABASE_URL", "postgres://db/motowash");

        assert!(matches!(
            load(&[base, ("PORT", "http")]),
            Err(ConfigError::InvalidValue("PORT"))
        ));
        assert!(matches!(
            load(&[base, ("LOYALTY_THRESHOLD", "0")]),
            Err(ConfigError::InvalidValue("LOYALTY_THRESHOLD"))
        ));
        assert!(matches!(
            load(&[base, ("LATE_CUTOFF", "8am")]),
            Err(ConfigError::InvalidValue("LATE_CUTOFF"))
        ));
        assert!(matches!(
            load(&[base, ("LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidValue("LOG_FORMAT"))
        ));
    }
}
