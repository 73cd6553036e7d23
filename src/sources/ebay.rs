//! eBay completed-sales integration.
//!
//! Prices a card from the most recently ended sold listings. Uses the
//! Finding API `findCompletedItems` operation, which wraps every JSON
//! value in a single-element array.
//!
//! API docs: https://developer.ebay.com/devzone/finding/CallRef/findCompletedItems.html
//! Base URL: https://svcs.ebay.com/services/search/FindingService/v1
//! Auth: application id via the `SECURITY-APPNAME` query parameter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PriceSource;
use crate::types::{
    mean, round_price, PriceQuery, RawObservation, SourceDetails, SourceOutcome, SourceSummary,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://svcs.ebay.com/services/search/FindingService/v1";

/// Most recently ended sold listings to average over.
pub const DEFAULT_ENTRIES_PER_PAGE: u32 = 5;

const SOURCE_NAME: &str = "eBay";

/// Prepended to every keyword search so results stay on-topic.
const KEYWORD_PREFIX: &str = "Pokemon";

/// Assumed when a listing omits its currency id.
const FALLBACK_CURRENCY: &str = "USD";

// ---------------------------------------------------------------------------
// Condition vocabulary
// ---------------------------------------------------------------------------

/// eBay's item condition buckets, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EbayCondition {
    New,
    NearMint,
    Excellent,
    #[default]
    Used,
    LightPlayed,
    Played,
    Poor,
}

impl EbayCondition {
    /// All buckets, best to worst.
    pub const ALL: &'static [EbayCondition] = &[
        EbayCondition::New,
        EbayCondition::NearMint,
        EbayCondition::Excellent,
        EbayCondition::Used,
        EbayCondition::LightPlayed,
        EbayCondition::Played,
        EbayCondition::Poor,
    ];

    /// Map a free-form condition label onto an eBay bucket.
    ///
    /// Case-insensitive and total: anything unrecognised is `Used`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "new" | "mint" => EbayCondition::New,
            "near mint" => EbayCondition::NearMint,
            "excellent" => EbayCondition::Excellent,
            "good" | "used" => EbayCondition::Used,
            "light played" => EbayCondition::LightPlayed,
            "played" => EbayCondition::Played,
            "poor" => EbayCondition::Poor,
            _ => EbayCondition::default(),
        }
    }

    /// 1 (best) through 7 (worst).
    pub fn tier(self) -> u8 {
        match self {
            EbayCondition::New => 1,
            EbayCondition::NearMint => 2,
            EbayCondition::Excellent => 3,
            EbayCondition::Used => 4,
            EbayCondition::LightPlayed => 5,
            EbayCondition::Played => 6,
            EbayCondition::Poor => 7,
        }
    }

    /// Condition id sent in the `Condition` item filter.
    pub fn code(self) -> &'static str {
        match self {
            EbayCondition::New => "1000",
            EbayCondition::NearMint => "1500",
            EbayCondition::Excellent => "2000",
            EbayCondition::Used => "3000",
            EbayCondition::LightPlayed => "4000",
            EbayCondition::Played => "5000",
            EbayCondition::Poor => "6000",
        }
    }
}

impl fmt::Display for EbayCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EbayCondition::New => "New/Mint",
            EbayCondition::NearMint => "Near Mint",
            EbayCondition::Excellent => "Excellent",
            EbayCondition::Used => "Good/Used",
            EbayCondition::LightPlayed => "Light Played",
            EbayCondition::Played => "Played",
            EbayCondition::Poor => "Poor",
        };
        write!(f, "{label}")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// eBay Finding API client.
pub struct EbayClient {
    http: Client,
    app_id: SecretString,
    base_url: String,
    entries_per_page: u32,
}

impl EbayClient {
    pub fn new(
        app_id: SecretString,
        base_url: String,
        entries_per_page: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("pokepricer/0.1.0")
            .build()
            .context("Failed to build HTTP client for eBay")?;

        Ok(Self {
            http,
            app_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            entries_per_page: entries_per_page.max(1),
        })
    }

    /// Search keywords: domain prefix, card name, language.
    fn keywords(query: &PriceQuery) -> String {
        format!("{KEYWORD_PREFIX} {} {}", query.card_name(), query.language())
    }

    fn search_url(&self, query: &PriceQuery) -> String {
        let condition = EbayCondition::from_label(query.condition());
        format!(
            "{}?OPERATION-NAME=findCompletedItems\
             &SERVICE-VERSION=1.0.0\
             &SECURITY-APPNAME={}\
             &RESPONSE-DATA-FORMAT=JSON\
             &REST-PAYLOAD\
             &keywords={}\
             &itemFilter(0).name=SoldItemsOnly&itemFilter(0).value=true\
             &itemFilter(1).name=Condition&itemFilter(1).value={}\
             &paginationInput.entriesPerPage={}\
             &sortOrder=EndTimeSoonest",
            self.base_url,
            urlencoding::encode(self.app_id.expose_secret()),
            urlencoding::encode(&Self::keywords(query)),
            condition.code(),
            self.entries_per_page,
        )
    }

    /// Fetch the most recent sold listings for a query.
    ///
    /// Listings that can't be priced are dropped; an empty vec means the
    /// search matched nothing usable.
    pub async fn search_sold_items(&self, query: &PriceQuery) -> Result<Vec<RawObservation>> {
        debug!(
            keywords = %Self::keywords(query),
            condition = %EbayCondition::from_label(query.condition()),
            "Fetching eBay completed items"
        );

        let resp = self
            .http
            .get(self.search_url(query))
            .send()
            .await
            .context("eBay API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("eBay API error: {status}");
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse eBay findCompletedItems response")?;

        Self::parse_completed_items(&body, self.entries_per_page as usize)
    }

    /// Extract listings from a `findCompletedItems` response body.
    fn parse_completed_items(body: &Value, limit: usize) -> Result<Vec<RawObservation>> {
        let response = body
            .pointer("/findCompletedItemsResponse/0")
            .context("Missing findCompletedItemsResponse")?;

        if let Some(ack) = response.pointer("/ack/0").and_then(Value::as_str) {
            if ack.eq_ignore_ascii_case("failure") {
                let message = response
                    .pointer("/errorMessage/0/error/0/message/0")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                anyhow::bail!("eBay API returned failure: {message}");
            }
        }

        let items = match response
            .pointer("/searchResult/0/item")
            .and_then(Value::as_array)
        {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };

        let parsed: Vec<RawObservation> = items
            .iter()
            .filter_map(Self::parse_item)
            .take(limit)
            .collect();

        if parsed.len() < items.len().min(limit) {
            debug!(
                returned = items.len(),
                kept = parsed.len(),
                "Dropped unparseable eBay listings"
            );
        }

        Ok(parsed)
    }

    /// One listing → observation, or `None` if its price is unusable.
    fn parse_item(item: &Value) -> Option<RawObservation> {
        let title = item
            .pointer("/title/0")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let current = item.pointer("/sellingStatus/0/currentPrice/0")?;

        let price = match current.get("__value__")? {
            Value::String(s) => Decimal::from_str(s.trim()).ok()?,
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
            _ => return None,
        };
        if price.is_sign_negative() {
            return None;
        }

        let currency = match current.get("@currencyId") {
            None => FALLBACK_CURRENCY.to_string(),
            Some(Value::String(c)) if !c.trim().is_empty() => c.trim().to_string(),
            Some(_) => return None,
        };

        Some(RawObservation { title, price, currency })
    }

    /// Average the listings into a summary; `None` when there are none.
    pub fn summarize(items: Vec<RawObservation>) -> Option<SourceSummary> {
        let first = items.first()?;
        let currency = first.currency.clone();
        let prices: Vec<Decimal> = items.iter().map(|i| i.price).collect();
        let average = round_price(mean(&prices)?);

        Some(SourceSummary {
            source: SOURCE_NAME.to_string(),
            average_price: average,
            currency,
            sample_size: Some(items.len()),
            details: Some(SourceDetails::Listings(items)),
        })
    }
}

// ---------------------------------------------------------------------------
// PriceSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PriceSource for EbayClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_summary(&self, query: &PriceQuery) -> SourceOutcome {
        match self.search_sold_items(query).await {
            Ok(items) => match Self::summarize(items) {
                Some(summary) => {
                    info!(
                        source = SOURCE_NAME,
                        average = %summary.average_price,
                        sample_size = ?summary.sample_size,
                        "Sold listings priced"
                    );
                    SourceOutcome::Found(summary)
                }
                None => {
                    info!(source = SOURCE_NAME, card = %query.card_name(), "No sold listings found");
                    SourceOutcome::NotFound
                }
            },
            Err(e) => {
                warn!(source = SOURCE_NAME, error = %format!("{e:#}"), "eBay lookup failed, treating as no results");
                SourceOutcome::NotFound
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
