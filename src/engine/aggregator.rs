//! Multi-source price aggregator.
//!
//! Fans one query out to every configured price source concurrently,
//! bounds each lookup with its own timeout, keeps whatever summaries come
//! back (in configuration order, not completion order) and blends them
//! into an overall average and range.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::sources::PriceSource;
use crate::types::{
    mean, round_price, AggregateResult, PriceQuery, PriceRange, SourceOutcome, SourceSummary,
    AGGREGATE_CURRENCY,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default bound on a single source lookup.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(8);

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Owns the ordered source list for the lifetime of the process.
pub struct PriceAggregator {
    sources: Vec<Box<dyn PriceSource>>,
    source_timeout: Duration,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Box<dyn PriceSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    /// Names of the configured sources, in query order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Price a card across all sources.
    ///
    /// Never fails: sources that time out or find nothing are left out,
    /// and an empty result is a valid "no pricing data" answer.
    pub async fn aggregate(&self, query: &PriceQuery) -> AggregateResult {
        info!(
            card = %query.card_name(),
            language = %query.language(),
            condition = %query.condition(),
            sources = self.sources.len(),
            "Pricing card"
        );

        let lookups = self
            .sources
            .iter()
            .map(|source| self.lookup(source.as_ref(), query));

        // join_all yields in input order regardless of completion order.
        let summaries: Vec<SourceSummary> = join_all(lookups)
            .await
            .into_iter()
            .filter_map(SourceOutcome::into_summary)
            .collect();

        let result = summarize(query.clone(), summaries);

        info!(
            found = result.sources.len(),
            average = ?result.average_price,
            "Pricing complete"
        );

        result
    }

    /// One source lookup under the per-source timeout.
    async fn lookup(&self, source: &dyn PriceSource, query: &PriceQuery) -> SourceOutcome {
        match tokio::time::timeout(self.source_timeout, source.fetch_summary(query)).await {
            Ok(outcome) => {
                debug!(source = source.name(), found = outcome.is_found(), "Source finished");
                outcome
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    timeout_ms = self.source_timeout.as_millis() as u64,
                    "Source timed out, continuing without"
                );
                SourceOutcome::NotFound
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Blending
// ---------------------------------------------------------------------------

/// Combine per-source summaries into the aggregate result.
///
/// Sources are weighted equally regardless of sample size. With no
/// summaries, `average_price` and `price_range` are both `None`.
pub fn summarize(query: PriceQuery, sources: Vec<SourceSummary>) -> AggregateResult {
    let prices: Vec<Decimal> = sources.iter().map(|s| s.average_price).collect();

    let average_price = mean(&prices).map(round_price);
    let price_range = match (prices.iter().min(), prices.iter().max()) {
        (Some(min), Some(max)) => Some(PriceRange {
            min: round_price(*min),
            max: round_price(*max),
        }),
        _ => None,
    };

    AggregateResult {
        query,
        sources,
        average_price,
        currency: AGGREGATE_CURRENCY.to_string(),
        price_range,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
