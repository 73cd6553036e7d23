//! Price source integrations.
//!
//! Defines the `PriceSource` trait and provides implementations for:
//! - eBay: completed/sold listings via the Finding API (needs an app id)
//! - TCGPlayer: retail search page, scraped for labeled prices

pub mod ebay;
pub mod tcgplayer;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, SourcesConfig};
use crate::types::{PriceQuery, SourceOutcome};

use ebay::EbayClient;
use tcgplayer::TcgPlayerClient;

/// Abstraction over price sources.
///
/// Implementors query one external source and normalise its answer into a
/// `SourceSummary`. Lookups never fail: transport errors, timeouts and
/// unparseable responses are logged and reported as `NotFound`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source identifier, unique per implementation ("eBay", "TCGPlayer").
    fn name(&self) -> &'static str;

    /// Look up the query and summarise what the source reports.
    async fn fetch_summary(&self, query: &PriceQuery) -> SourceOutcome;
}

/// Build the configured sources in their fixed order (eBay, then TCGPlayer).
///
/// eBay is only registered when its app id env var is set; a missing
/// credential is not an error.
pub fn build_sources(cfg: &SourcesConfig) -> Result<Vec<Box<dyn PriceSource>>> {
    let mut sources: Vec<Box<dyn PriceSource>> = Vec::new();

    if cfg.ebay.enabled {
        match AppConfig::resolve_env(&cfg.ebay.app_id_env) {
            Ok(app_id) if !app_id.trim().is_empty() => {
                let client = EbayClient::new(
                    SecretString::new(app_id),
                    cfg.ebay.base_url.clone(),
                    cfg.ebay.entries_per_page,
                    Duration::from_secs(cfg.ebay.timeout_secs),
                )
                .context("Failed to initialise eBay source")?;
                sources.push(Box::new(client));
            }
            _ => {
                warn!(
                    env = %cfg.ebay.app_id_env,
                    "eBay: API credentials not configured, source disabled"
                );
            }
        }
    }

    if cfg.tcgplayer.enabled {
        let client = TcgPlayerClient::new(
            cfg.tcgplayer.base_url.clone(),
            &cfg.tcgplayer.user_agent,
            Duration::from_secs(cfg.tcgplayer.timeout_secs),
        )
        .context("Failed to initialise TCGPlayer source")?;
        sources.push(Box::new(client));
    }

    info!(
        sources = ?sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Price sources configured"
    );

    Ok(sources)
}
