//! eBay and TCGPlayer clients against local axum servers that stand in
//! for the real endpoints.

#[cfg(test)]
mod tests {
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{Html, IntoResponse};
    use axum::routing::get;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use pokepricer::engine::aggregator::PriceAggregator;
    use pokepricer::sources::ebay::EbayClient;
    use pokepricer::sources::tcgplayer::{TcgPlayerClient, DEFAULT_USER_AGENT};
    use pokepricer::sources::PriceSource;
    use pokepricer::types::{PriceQuery, SourceDetails, SourceOutcome};

    type Captured = Arc<Mutex<Option<HashMap<String, String>>>>;

    const LABELED_PAGE: &str = r#"
        <html><body>
          <div class="search-result">
            <span class="product-title">Charizard VMAX</span>
            <span class="market-price">Market Price: $52.00</span>
            <span class="low-price">Low Price: $41.00</span>
          </div>
        </body></html>"#;

    const EMPTY_PAGE: &str =
        "<html><body><p>No results found. Try a different search.</p></body></html>";

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn completed_items(prices: &[&str]) -> Value {
        let items: Vec<Value> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                json!({
                    "title": [format!("Card {}", i + 1)],
                    "sellingStatus": [{
                        "currentPrice": [{ "__value__": p, "@currencyId": "USD" }]
                    }]
                })
            })
            .collect();
        json!({
            "findCompletedItemsResponse": [{
                "ack": ["Success"],
                "searchResult": [{ "item": items }]
            }]
        })
    }

    async fn ebay_server(body: Value, captured: Captured) -> String {
        let app = Router::new()
            .route(
                "/ebay",
                get(
                    |State((body, captured)): State<(Value, Captured)>,
                     Query(params): Query<HashMap<String, String>>| async move {
                        *captured.lock().unwrap() = Some(params);
                        Json(body)
                    },
                ),
            )
            .with_state((body, captured));
        format!("{}/ebay", serve(app).await)
    }

    async fn tcgplayer_server(page: &'static str) -> String {
        let app = Router::new().route(
            "/search/pokemon/product",
            get(move || async move { Html(page) }),
        );
        serve(app).await
    }

    async fn failing_server(status: StatusCode, body: &'static str) -> String {
        let app = Router::new()
            .fallback(move || async move { (status, body).into_response() });
        serve(app).await
    }

    fn ebay_client(base_url: String) -> EbayClient {
        EbayClient::new(
            SecretString::new("test_app_id".to_string()),
            base_url,
            5,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn tcgplayer_client(base_url: String) -> TcgPlayerClient {
        TcgPlayerClient::new(base_url, DEFAULT_USER_AGENT, Duration::from_secs(5)).unwrap()
    }

    fn query() -> PriceQuery {
        PriceQuery::new("Charizard", Some("English"), Some("Near Mint")).unwrap()
    }

    // -- eBay --

    #[tokio::test]
    async fn test_ebay_average_of_sold_listings() {
        let captured: Captured = Arc::default();
        let url = ebay_server(completed_items(&["10.00", "20.00"]), captured.clone()).await;

        let summary = ebay_client(url).fetch_summary(&query()).await.into_summary().unwrap();
        assert_eq!(summary.source, "eBay");
        assert_eq!(summary.average_price, dec!(15.00));
        assert_eq!(summary.sample_size, Some(2));
        assert!(matches!(summary.details, Some(SourceDetails::Listings(ref l)) if l.len() == 2));
    }

    #[tokio::test]
    async fn test_ebay_request_parameters() {
        let captured: Captured = Arc::default();
        let url = ebay_server(completed_items(&["1.00"]), captured.clone()).await;

        ebay_client(url).fetch_summary(&query()).await;

        let params = captured.lock().unwrap().clone().unwrap();
        assert_eq!(params["OPERATION-NAME"], "findCompletedItems");
        assert_eq!(params["SECURITY-APPNAME"], "test_app_id");
        assert_eq!(params["keywords"], "Pokemon Charizard English");
        assert_eq!(params["itemFilter(0).name"], "SoldItemsOnly");
        assert_eq!(params["itemFilter(1).value"], "1500");
        assert_eq!(params["paginationInput.entriesPerPage"], "5");
        assert_eq!(params["sortOrder"], "EndTimeSoonest");
    }

    #[tokio::test]
    async fn test_ebay_no_listings_is_not_found() {
        let body = json!({ "findCompletedItemsResponse": [{ "searchResult": [{}] }] });
        let url = ebay_server(body, Arc::default()).await;
        assert_eq!(ebay_client(url).fetch_summary(&query()).await, SourceOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_ebay_server_error_is_not_found() {
        let url = failing_server(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        assert_eq!(ebay_client(url).fetch_summary(&query()).await, SourceOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_ebay_malformed_body_is_not_found() {
        let url = failing_server(StatusCode::OK, "this is not json").await;
        assert_eq!(ebay_client(url).fetch_summary(&query()).await, SourceOutcome::NotFound);
    }

    // -- TCGPlayer --

    #[tokio::test]
    async fn test_tcgplayer_labeled_market_price() {
        let url = tcgplayer_server(LABELED_PAGE).await;
        let summary = tcgplayer_client(url)
            .fetch_summary(&query())
            .await
            .into_summary()
            .unwrap();
        assert_eq!(summary.source, "TCGPlayer");
        assert_eq!(summary.average_price, dec!(52.00));
        assert_eq!(summary.currency, "USD");
        match summary.details {
            Some(SourceDetails::PriceFields(fields)) => {
                assert_eq!(fields.low_price, Some(dec!(41.00)));
            }
            other => panic!("expected price fields, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tcgplayer_page_without_prices_is_not_found() {
        let url = tcgplayer_server(EMPTY_PAGE).await;
        assert_eq!(
            tcgplayer_client(url).fetch_summary(&query()).await,
            SourceOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_tcgplayer_blocked_is_not_found() {
        let url = failing_server(StatusCode::FORBIDDEN, "Access denied").await;
        assert_eq!(
            tcgplayer_client(url).fetch_summary(&query()).await,
            SourceOutcome::NotFound
        );
    }

    // -- End to end --

    #[tokio::test]
    async fn test_only_priceless_retail_source_yields_empty_result() {
        let url = tcgplayer_server(EMPTY_PAGE).await;
        let aggregator = PriceAggregator::new(
            vec![Box::new(tcgplayer_client(url))],
            Duration::from_secs(5),
        );
        let result = aggregator.aggregate(&query()).await;
        assert!(result.sources.is_empty());
        assert!(result.average_price.is_none());
        assert!(result.price_range.is_none());
    }

    #[tokio::test]
    async fn test_full_pipeline_blends_both_sources() {
        let ebay_url = ebay_server(completed_items(&["40.00", "50.00"]), Arc::default()).await;
        let tcg_url = tcgplayer_server(LABELED_PAGE).await;

        let sources: Vec<Box<dyn PriceSource>> = vec![
            Box::new(ebay_client(ebay_url)),
            Box::new(tcgplayer_client(tcg_url)),
        ];
        let aggregator = PriceAggregator::new(sources, Duration::from_secs(5));
        let result = aggregator.aggregate(&query()).await;

        let names: Vec<&str> = result.sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(names, vec!["eBay", "TCGPlayer"]);
        // eBay 45.00, TCGPlayer 52.00
        assert_eq!(result.average_price, Some(dec!(48.50)));
        let range = result.price_range.unwrap();
        assert_eq!((range.min, range.max), (dec!(45.00), dec!(52.00)));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["card_name"], "Charizard");
        assert_eq!(json["sources"][0]["sample_size"], 2);
        assert_eq!(json["average_price"].as_f64().unwrap(), 48.5);
    }

    #[tokio::test]
    async fn test_one_source_down_other_still_priced() {
        let ebay_url = failing_server(StatusCode::SERVICE_UNAVAILABLE, "down").await;
        let tcg_url = tcgplayer_server(LABELED_PAGE).await;

        let sources: Vec<Box<dyn PriceSource>> = vec![
            Box::new(ebay_client(ebay_url)),
            Box::new(tcgplayer_client(tcg_url)),
        ];
        let result = PriceAggregator::new(sources, Duration::from_secs(5))
            .aggregate(&query())
            .await;

        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].source, "TCGPlayer");
        assert_eq!(result.average_price, Some(dec!(52.00)));
    }
}
