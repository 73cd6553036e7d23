//! Shared types for the price aggregator.
//!
//! These types form the data model passed between the price sources,
//! the aggregator and the terminal front end. Every monetary value is a
//! `Decimal` rounded to cents at the point it enters a summary.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// Currency reported at the aggregate level.
pub const AGGREGATE_CURRENCY: &str = "USD";

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_CONDITION: &str = "Near Mint";

/// Round a monetary value to 2 decimal places (banker's rounding).
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Arithmetic mean of a set of prices, `None` when empty.
///
/// Amounts whose sum would overflow `Decimal` are scaled down before
/// adding; `None` only if even that overflows.
pub fn mean(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let count = Decimal::from(prices.len());
    match prices.iter().try_fold(Decimal::ZERO, |acc, p| acc.checked_add(*p)) {
        Some(total) => total.checked_div(count),
        None => prices
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.checked_div(count)?)),
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A single card lookup.
///
/// `language` and `condition` are free-form display strings; each price
/// source maps `condition` onto its own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuery {
    card_name: String,
    language: String,
    condition: String,
}

impl PriceQuery {
    /// Build a query from raw user input.
    ///
    /// Inputs are trimmed; a blank language or condition falls back to the
    /// defaults. A blank card name is rejected.
    pub fn new(
        card_name: &str,
        language: Option<&str>,
        condition: Option<&str>,
    ) -> Result<Self, PricerError> {
        let card_name = card_name.trim();
        if card_name.is_empty() {
            return Err(PricerError::InvalidQuery(
                "Please enter a card name".to_string(),
            ));
        }

        let or_default = |value: Option<&str>, default: &str| -> String {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Ok(Self {
            card_name: card_name.to_string(),
            language: or_default(language, DEFAULT_LANGUAGE),
            condition: or_default(condition, DEFAULT_CONDITION),
        })
    }

    pub fn card_name(&self) -> &str {
        &self.card_name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }
}

impl fmt::Display for PriceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Language: {} | Condition: {})",
            self.card_name, self.language, self.condition
        )
    }
}

// ---------------------------------------------------------------------------
// Source-level results
// ---------------------------------------------------------------------------

/// One priced observation reported by a source (e.g. a sold listing).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawObservation {
    pub title: String,
    pub price: Decimal,
    pub currency: String,
}

/// Labeled price figures scraped from a retail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_price: Option<Decimal>,
}

impl PriceFields {
    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }

    /// The fields that were found, in low/mid/high/market order.
    pub fn present(&self) -> Vec<Decimal> {
        [self.low_price, self.mid_price, self.high_price, self.market_price]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Representative price: the market price when known, otherwise the
    /// mean of whichever fields were found.
    pub fn representative(&self) -> Option<Decimal> {
        self.market_price.or_else(|| mean(&self.present()))
    }
}

/// Source-specific extras carried alongside a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SourceDetails {
    #[serde(rename = "items")]
    Listings(Vec<RawObservation>),
    #[serde(rename = "details")]
    PriceFields(PriceFields),
}

/// Normalised result from one price source for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub average_price: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(flatten)]
    pub details: Option<SourceDetails>,
}

/// What a price source produced for a query.
///
/// Every failure mode (no results, not configured, transport error,
/// timeout, unparseable body) collapses to `NotFound`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Found(SourceSummary),
    NotFound,
}

impl SourceOutcome {
    pub fn into_summary(self) -> Option<SourceSummary> {
        match self {
            SourceOutcome::Found(summary) => Some(summary),
            SourceOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SourceOutcome::Found(_))
    }
}

impl From<Option<SourceSummary>> for SourceOutcome {
    fn from(summary: Option<SourceSummary>) -> Self {
        summary.map_or(SourceOutcome::NotFound, SourceOutcome::Found)
    }
}

// ---------------------------------------------------------------------------
// Aggregate result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

/// Cross-source pricing for one query. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    #[serde(flatten)]
    pub query: PriceQuery,
    /// In source configuration order.
    pub sources: Vec<SourceSummary>,
    pub average_price: Option<Decimal>,
    pub currency: String,
    pub price_range: Option<PriceRange>,
}

impl AggregateResult {
    /// No source produced a summary.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

const RULE: &str = "------------------------------------------------------------";
const BANNER_RULE: &str = "============================================================";

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BANNER_RULE}")?;
        writeln!(f, "PRICING SUMMARY")?;
        writeln!(f, "{BANNER_RULE}")?;
        writeln!(f, "Card: {}", self.query.card_name())?;
        writeln!(f, "Language: {}", self.query.language())?;
        writeln!(f, "Condition: {}", self.query.condition())?;
        writeln!(f, "{BANNER_RULE}")?;

        if self.sources.is_empty() {
            writeln!(f, "No pricing data found from any source.")?;
            writeln!(f, "Please check:")?;
            writeln!(f, "  - Card name spelling")?;
            writeln!(f, "  - Internet connection")?;
            return write!(f, "  - API credentials (for eBay)");
        }

        writeln!(f, "SOURCE BREAKDOWN:")?;
        writeln!(f, "{RULE}")?;
        for source in &self.sources {
            writeln!(
                f,
                "{:20} ${:>8.2} {}",
                source.source, source.average_price, source.currency
            )?;
            if let Some(n) = source.sample_size {
                writeln!(f, "{:20} (Based on {n} sold items)", "")?;
            }
        }
        writeln!(f, "{RULE}")?;

        if let Some(avg) = self.average_price {
            writeln!(f, "{:20} ${:>8.2} {}", "OVERALL AVERAGE:", avg, self.currency)?;
        }
        if let Some(range) = self.price_range {
            writeln!(f, "{:20} ${:.2} - ${:.2}", "PRICE RANGE:", range.min, range.max)?;
        }
        write!(f, "{BANNER_RULE}")
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the pricer.
#[derive(Debug, thiserror::Error)]
pub enum PricerError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
