//! Configuration for the split ledger and settlement engine

use crate::money::{Precision, DEFAULT_EPSILON, DEFAULT_FRACTIONAL_DIGITS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Amount precision
    pub precision: PrecisionConfig,

    /// Display-name resolution
    pub names: NamesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "split-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            precision: PrecisionConfig::default(),
            names: NamesConfig::default(),
        }
    }
}

/// Amount precision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionConfig {
    /// Fractional digits carried by settled amounts
    pub fractional_digits: u32,

    /// Balances below this magnitude count as zero
    #[serde(with = "rust_decimal::serde::str")]
    pub epsilon: Decimal,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            fractional_digits: DEFAULT_FRACTIONAL_DIGITS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Name resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Resolve display names for report labels
    pub enabled: bool,

    /// Cache lifetime (seconds)
    pub cache_ttl_seconds: u64,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_seconds: 300, // 5 minutes
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.precision()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(digits) = std::env::var("SPLIT_FRACTIONAL_DIGITS") {
            config.precision.fractional_digits = digits.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SPLIT_FRACTIONAL_DIGITS: {}", e))
            })?;
        }

        if let Ok(epsilon) = std::env::var("SPLIT_EPSILON") {
            config.precision.epsilon = Decimal::from_str(&epsilon)
                .map_err(|e| crate::Error::Config(format!("Invalid SPLIT_EPSILON: {}", e)))?;
        }

        if let Ok(ttl) = std::env::var("SPLIT_NAME_CACHE_TTL") {
            config.names.cache_ttl_seconds = ttl.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SPLIT_NAME_CACHE_TTL: {}", e))
            })?;
        }

        config.precision()?;
        Ok(config)
    }

    /// Validated precision rules
    pub fn precision(&self) -> crate::Result<Precision> {
        Precision::new(self.precision.fractional_digits, self.precision.epsilon)
    }
}
