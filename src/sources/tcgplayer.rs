//! TCGPlayer retail price integration.
//!
//! Scrapes the product search page for price figures. Markup changes
//! regularly, so extraction is best-effort and works on the page's
//! visible text rather than specific elements:
//!
//! 1. labeled fields ("Market Price: $45.99", "low_price": 40.00, ...)
//! 2. failing that, the first few `$`-prefixed amounts on the page
//!
//! Search URL: `https://www.tcgplayer.com/search/pokemon/product?q=...`
//! Auth: none. A desktop browser User-Agent avoids trivial blocking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PriceSource;
use crate::types::{
    mean, round_price, PriceFields, PriceQuery, SourceDetails, SourceOutcome, SourceSummary,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://www.tcgplayer.com";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const SEARCH_PATH: &str = "/search/pokemon/product";
const SOURCE_NAME: &str = "TCGPlayer";
const CURRENCY: &str = "USD";

/// Amounts sampled by the unlabeled fallback scan.
const FALLBACK_TOKEN_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// `label` + optional separator + `price`, then quote/space/colon/`>` and
/// an optional dollar sign before the amount.
fn labeled(label: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)\b{label}[_\s-]?price["\s:>]+\$?\s*(\d[\d,]*(?:\.\d+)?)"#
    ))
    .expect("valid regex")
}

static MARKET_PRICE: LazyLock<Regex> = LazyLock::new(|| labeled("market"));
static LOW_PRICE: LazyLock<Regex> = LazyLock::new(|| labeled("low"));
static MID_PRICE: LazyLock<Regex> = LazyLock::new(|| labeled("mid"));
static HIGH_PRICE: LazyLock<Regex> = LazyLock::new(|| labeled("high"));

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Text a browser would render: scripts, styles, comments and tags
/// removed, common entities decoded.
fn visible_text(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = TAG.replace_all(&without_code, " ");
    text.replace("&nbsp;", " ")
        .replace("&#36;", "$")
        .replace("&dollar;", "$")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

/// "1,234.50" → 1234.50
fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.replace(',', "")).ok()
}

fn first_amount(pattern: &Regex, text: &str) -> Option<Decimal> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_amount(m.as_str()))
}

/// Strategy 1: labeled market/low/mid/high fields.
fn labeled_fields(text: &str) -> PriceFields {
    PriceFields {
        market_price: first_amount(&MARKET_PRICE, text),
        low_price: first_amount(&LOW_PRICE, text),
        mid_price: first_amount(&MID_PRICE, text),
        high_price: first_amount(&HIGH_PRICE, text),
    }
}

/// Strategy 2: the first few dollar amounts anywhere on the page.
fn currency_tokens(text: &str, limit: usize) -> Vec<Decimal> {
    DOLLAR_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
        .take(limit)
        .collect()
}

/// Pull price figures out of a search/product page.
///
/// Returns `None` when neither strategy finds a single amount.
pub fn extract_prices(html: &str) -> Option<PriceFields> {
    let text = visible_text(html);

    let fields = labeled_fields(&text);
    if !fields.is_empty() {
        return Some(fields);
    }

    let tokens = currency_tokens(&text, FALLBACK_TOKEN_LIMIT);
    debug!(tokens = tokens.len(), "No labeled prices, using dollar amounts");

    let market = mean(&tokens)?;
    Some(PriceFields {
        market_price: Some(round_price(market)),
        low_price: tokens.iter().min().copied(),
        mid_price: None,
        high_price: tokens.iter().max().copied(),
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// TCGPlayer search page scraper.
pub struct TcgPlayerClient {
    http: Client,
    base_url: String,
}

impl TcgPlayerClient {
    pub fn new(base_url: String, user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client for TCGPlayer")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, query: &PriceQuery) -> String {
        format!(
            "{}{SEARCH_PATH}?q={}&language={}",
            self.base_url,
            urlencoding::encode(query.card_name()),
            urlencoding::encode(query.language()),
        )
    }

    /// Fetch the search page and extract whatever prices it shows.
    pub async fn search_card(&self, query: &PriceQuery) -> Result<Option<PriceFields>> {
        let url = self.search_url(query);
        debug!(url = %url, "Fetching TCGPlayer search page");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("TCGPlayer request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("TCGPlayer error: {status}");
        }

        let html = resp
            .text()
            .await
            .context("Failed to read TCGPlayer response body")?;

        Ok(extract_prices(&html))
    }

    /// Reduce scraped fields to one representative price.
    pub fn summarize(fields: PriceFields) -> Option<SourceSummary> {
        let average = round_price(fields.representative()?);

        Some(SourceSummary {
            source: SOURCE_NAME.to_string(),
            average_price: average,
            currency: CURRENCY.to_string(),
            sample_size: None,
            details: Some(SourceDetails::PriceFields(fields)),
        })
    }
}

// ---------------------------------------------------------------------------
// PriceSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PriceSource for TcgPlayerClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_summary(&self, query: &PriceQuery) -> SourceOutcome {
        match self.search_card(query).await {
            Ok(Some(fields)) => {
                let outcome = SourceOutcome::from(Self::summarize(fields));
                if let SourceOutcome::Found(summary) = &outcome {
                    info!(source = SOURCE_NAME, average = %summary.average_price, "Retail price found");
                }
                outcome
            }
            Ok(None) => {
                info!(source = SOURCE_NAME, card = %query.card_name(), "No prices on page");
                SourceOutcome::NotFound
            }
            Err(e) => {
                warn!(source = SOURCE_NAME, error = %format!("{e:#}"), "TCGPlayer lookup failed, treating as no results");
                SourceOutcome::NotFound
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
