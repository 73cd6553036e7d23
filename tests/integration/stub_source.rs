//! Stub price source for integration testing.
//!
//! Provides a deterministic `PriceSource` implementation that returns a
//! fixed outcome after a configurable delay and counts how often it was
//! asked. No network access.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pokepricer::sources::PriceSource;
use pokepricer::types::*;

/// A stub price source for deterministic testing.
pub struct StubSource {
    name: &'static str,
    outcome: SourceOutcome,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubSource {
    /// A source that reports `price` immediately.
    pub fn found(name: &'static str, price: Decimal) -> Self {
        Self {
            name,
            outcome: SourceOutcome::Found(SourceSummary {
                source: name.to_string(),
                average_price: price,
                currency: "USD".to_string(),
                sample_size: None,
                details: None,
            }),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that never finds anything.
    pub fn not_found(name: &'static str) -> Self {
        Self {
            name,
            outcome: SourceOutcome::NotFound,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared call counter, readable after the stub is boxed.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PriceSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_summary(&self, _query: &PriceQuery) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn query() -> PriceQuery {
        PriceQuery::new("Charizard", None, None).unwrap()
    }

    #[tokio::test]
    async fn test_stub_found() {
        let stub = StubSource::found("eBay", dec!(12.00));
        let outcome = stub.fetch_summary(&query()).await;
        assert_eq!(outcome.into_summary().unwrap().average_price, dec!(12.00));
    }

    #[tokio::test]
    async fn test_stub_counts_calls() {
        let stub = StubSource::not_found("TCGPlayer");
        let calls = stub.calls();
        stub.fetch_summary(&query()).await;
        stub.fetch_summary(&query()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(stub.name(), "TCGPlayer");
    }
}
