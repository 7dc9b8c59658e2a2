//! Store configuration.
//!
//! Loaded from environment variables by `from_env`, or from any lookup
//! function by `from_lookup`.
//!
//! # Environment Variables
//!
//! - `TKV_NAMESPACE`: Key namespace (default: `tkv`)
//! - `TKV_DELIMITER`: Key segment delimiter, `unit` or `pipe` (default: `unit`)
//! - `TKV_PAGE_SIZE`: Records per page when paginating (default: `1000`)
//! - `TKV_CONSISTENT`: Use the consistent fetch strategy, `true` or `false`
//!   (default: `false`)
//!
//! # Invariants
//!
//! - `namespace` is never empty
//! - `page_size` is always positive

use crate::key::Delimiter;
use crate::kv::FetchStrategy;

const NAMESPACE_VAR: &str = "TKV_NAMESPACE";
const DELIMITER_VAR: &str = "TKV_DELIMITER";
const PAGE_SIZE_VAR: &str = "TKV_PAGE_SIZE";
const CONSISTENT_VAR: &str = "TKV_CONSISTENT";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TkvConfig {
    /// Prefix of every key written by this store.
    pub namespace: String,
    /// Separator between key segments.
    pub delimiter: Delimiter,
    /// Records fetched per page when paginating.
    pub page_size: usize,
    /// Whether pages are read with the consistent strategy.
    pub consistent: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for TkvConfig {
    fn default() -> Self {
        Self {
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            delimiter: Delimiter::default(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            consistent: false,
        }
    }
}

impl TkvConfig {
    /// Default key namespace.
    pub const DEFAULT_NAMESPACE: &'static str = "tkv";
    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its
    /// value (`None` if unset).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `TKV_NAMESPACE` is set but empty
    /// - `TKV_DELIMITER` is not `unit` or `pipe`
    /// - `TKV_PAGE_SIZE` is not a positive integer
    /// - `TKV_CONSISTENT` is not `true` or `false`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let namespace = Self::load_namespace(lookup(NAMESPACE_VAR))?;
        let delimiter = Self::load_delimiter(lookup(DELIMITER_VAR))?;
        let page_size = Self::load_page_size(lookup(PAGE_SIZE_VAR))?;
        let consistent = Self::load_consistent(lookup(CONSISTENT_VAR))?;

        Ok(Self {
            namespace,
            delimiter,
            page_size,
            consistent,
        })
    }

    /// The fetch strategy selected by `consistent`.
    #[must_use]
    pub const fn strategy(&self) -> FetchStrategy {
        if self.consistent {
            FetchStrategy::Consistent
        } else {
            FetchStrategy::Scan
        }
    }

    fn load_namespace(value: Option<String>) -> Result<String, ConfigError> {
        match value {
            None => Ok(Self::DEFAULT_NAMESPACE.to_string()),
            Some(value) if value.is_empty() => Err(invalid(NAMESPACE_VAR, "must not be empty")),
            Some(value) => Ok(value),
        }
    }

    fn load_delimiter(value: Option<String>) -> Result<Delimiter, ConfigError> {
        let Some(value) = value else {
            return Ok(Delimiter::default());
        };
        Delimiter::from_name(&value).ok_or_else(|| {
            invalid(
                DELIMITER_VAR,
                format!("'{value}' is not a delimiter (expected 'unit' or 'pipe')"),
            )
        })
    }

    fn load_page_size(value: Option<String>) -> Result<usize, ConfigError> {
        let Some(value) = value else {
            return Ok(Self::DEFAULT_PAGE_SIZE);
        };
        match value.parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(invalid(
                PAGE_SIZE_VAR,
                format!("'{value}' is not a positive integer"),
            )),
        }
    }

    fn load_consistent(value: Option<String>) -> Result<bool, ConfigError> {
        let Some(value) = value else {
            return Ok(false);
        };
        value.parse::<bool>().map_err(|_| {
            invalid(
                CONSISTENT_VAR,
                format!("'{value}' is not a boolean (expected 'true' or 'false')"),
            )
        })
    }
}

fn invalid(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TkvConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        TkvConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).expect("defaults");
        assert_eq!(config, TkvConfig::default());
        assert_eq!(config.namespace, "tkv");
        assert_eq!(config.delimiter, Delimiter::Unit);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.strategy(), FetchStrategy::Scan);
    }

    #[test]
    fn test_all_values_set() {
        let config = load(&[
            ("TKV_NAMESPACE", "events"),
            ("TKV_DELIMITER", "pipe"),
            ("TKV_PAGE_SIZE", "250"),
            ("TKV_CONSISTENT", "true"),
        ])
        .expect("config");

        assert_eq!(config.namespace, "events");
        assert_eq!(config.delimiter, Delimiter::Pipe);
        assert_eq!(config.page_size, 250);
        assert_eq!(config.strategy(), FetchStrategy::Consistent);
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let error = load(&[("TKV_NAMESPACE", "")]).expect_err("empty namespace");
        assert_eq!(
            error.to_string(),
            "invalid value for TKV_NAMESPACE: must not be empty"
        );
    }

    #[test]
    fn test_invalid_page_size() {
        for value in ["0", "-5", "many"] {
            let error = load(&[("TKV_PAGE_SIZE", value)]).expect_err("invalid page size");
            assert!(matches!(
                error,
                ConfigError::InvalidValue { ref name, .. } if name == "TKV_PAGE_SIZE"
            ));
        }
    }

    #[test]
    fn test_invalid_delimiter_and_flag() {
        assert!(load(&[("TKV_DELIMITER", "comma")]).is_err());
        assert!(load(&[("TKV_CONSISTENT", "yes")]).is_err());
    }

    #[test]
    fn test_unset_and_set_variables_mix() {
        // Unset variables fall back to defaults; none is required
        let config = load(&[("TKV_PAGE_SIZE", "10")]).expect("config");
        assert_eq!(config.namespace, TkvConfig::DEFAULT_NAMESPACE);
        assert_eq!(config.page_size, 10);

        let error = load(&[("TKV_NAMESPACE", "ok"), ("TKV_DELIMITER", "comma")])
            .expect_err("invalid delimiter");
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref name, .. } if name == "TKV_DELIMITER"
        ));
        assert!(error.to_string().contains("'comma' is not a delimiter"));
    }
}
