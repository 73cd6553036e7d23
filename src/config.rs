//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a partial (or empty) file is valid.
//! Secrets (the eBay app id) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use tracing::warn;

use crate::types::PricerError;

/// eBay's Finding API caps `paginationInput.entriesPerPage` at 100.
const MAX_EBAY_ENTRIES_PER_PAGE: u32 = 100;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub aggregator: AggregatorConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    pub name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "pokepricer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Upper bound on a single source lookup.
    pub source_timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub ebay: EbayConfig,
    pub tcgplayer: TcgPlayerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EbayConfig {
    pub enabled: bool,
    /// Name of the env var holding the eBay application id.
    pub app_id_env: String,
    pub base_url: String,
    pub entries_per_page: u32,
    pub timeout_secs: u64,
}

impl Default for EbayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id_env: "EBAY_APP_ID".to_string(),
            base_url: crate::sources::ebay::DEFAULT_BASE_URL.to_string(),
            entries_per_page: crate::sources::ebay::DEFAULT_ENTRIES_PER_PAGE,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TcgPlayerConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for TcgPlayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: crate::sources::tcgplayer::DEFAULT_BASE_URL.to_string(),
            user_agent: crate::sources::tcgplayer::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {path}")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config file: {path}")),
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every lookup fail or time out at once.
    pub fn validate(&self) -> Result<(), PricerError> {
        if self.aggregator.source_timeout_secs == 0 {
            return Err(PricerError::Config(
                "aggregator.source_timeout_secs must be greater than 0".to_string(),
            ));
        }
        let ebay = &self.sources.ebay;
        if !(1..=MAX_EBAY_ENTRIES_PER_PAGE).contains(&ebay.entries_per_page) {
            return Err(PricerError::Config(format!(
                "sources.ebay.entries_per_page must be between 1 and {MAX_EBAY_ENTRIES_PER_PAGE}"
            )));
        }
        if ebay.timeout_secs == 0 || self.sources.tcgplayer.timeout_secs == 0 {
            return Err(PricerError::Config(
                "source timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
