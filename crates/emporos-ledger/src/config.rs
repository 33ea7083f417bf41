//! Ledger configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use emporos_db::DbConfig;

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a writer waits for the write lock, in milliseconds
    pub busy_timeout_ms: u64,

    /// Attempts at inserting a document number before giving up
    pub numbering_retries: u32,

    /// Customer billed by retail receipts that name no customer
    pub retail_customer_code: String,

    /// Customer used by stand-alone delivery notes without a customer
    pub generic_dn_customer_code: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("./emporos.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            numbering_retries: 5,
            retail_customer_code: "RETAIL".to_string(),
            generic_dn_customer_code: "DN-GENERIC".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            database_path: lookup("EMPOROS_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "EMPOROS_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_ms: parse_or(&lookup, "EMPOROS_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,

            numbering_retries: parse_or(&lookup, "EMPOROS_NUMBERING_RETRIES", defaults.numbering_retries)?,

            retail_customer_code: lookup("EMPOROS_RETAIL_CUSTOMER_CODE")
                .unwrap_or(defaults.retail_customer_code),

            generic_dn_customer_code: lookup("EMPOROS_GENERIC_DN_CUSTOMER_CODE")
                .unwrap_or(defaults.generic_dn_customer_code),
        };

        if config.numbering_retries == 0 {
            return Err(ConfigError::InvalidValue("EMPOROS_NUMBERING_RETRIES".to_string()));
        }
        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("EMPOROS_MAX_CONNECTIONS".to_string()));
        }
        if config.retail_customer_code.trim().is_empty() {
            return Err(ConfigError::MissingRequired("EMPOROS_RETAIL_CUSTOMER_CODE".to_string()));
        }
        if config.generic_dn_customer_code.trim().is_empty() {
            return Err(ConfigError::MissingRequired("EMPOROS_GENERIC_DN_CUSTOMER_CODE".to_string()));
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.numbering_retries, 5);
        assert_eq!(config.retail_customer_code, "RETAIL");
        assert_eq!(config.db_config().busy_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("EMPOROS_DATABASE_PATH", "/var/lib/emporos/ledger.db"),
            ("EMPOROS_MAX_CONNECTIONS", "8"),
            ("EMPOROS_NUMBERING_RETRIES", "3"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/emporos/ledger.db"));
        assert_eq!(config.db_config().max_connections, 8);
        assert_eq!(config.numbering_retries, 3);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[("EMPOROS_BUSY_TIMEOUT_MS", "soon")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[("EMPOROS_NUMBERING_RETRIES", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[("EMPOROS_RETAIL_CUSTOMER_CODE", " ")])),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
