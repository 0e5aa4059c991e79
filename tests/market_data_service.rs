//! Behavior-driven tests for the market data façade.
//!
//! The real vendor adapters run against a stubbed HTTP transport, so these
//! tests cover the full path: cache, coalescer, chain, adapters and the
//! synthetic fallback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quantpulse_core::{
    CacheSettings, ChainMode, CoreConfig, FetchError, HttpClient, HttpError, HttpFuture,
    HttpRequest, HttpResponse, MarketDataService, Period, Provenance, ProviderChainBuilder,
    ProviderId, Symbol,
};

const TWELVEDATA_QUOTE: &str =
    r#"{"symbol":"TCS","close":"3820.50","previous_close":"3800.00","volume":"2100000","is_market_open":true}"#;
const FINNHUB_QUOTE: &str = r#"{"c":3815.25,"d":15.25,"dp":0.4,"pc":3800,"t":1709640000}"#;

/// Answers by URL path; the last scripted response for a path repeats.
#[derive(Default)]
struct StubVendors {
    scripts: Mutex<HashMap<String, Vec<Result<HttpResponse, HttpError>>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubVendors {
    fn on(self, url: &str, responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        self.scripts
            .lock()
            .expect("scripts")
            .insert(url.to_owned(), responses);
        self
    }

    fn requests_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .expect("requests")
            .iter()
            .filter(|request| request.url == url)
            .count()
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

impl HttpClient for StubVendors {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let response = {
            let mut scripts = self.scripts.lock().expect("scripts");
            match scripts.get_mut(&request.url) {
                Some(script) if script.len() > 1 => script.remove(0),
                Some(script) => script
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err(HttpError::connect("empty script"))),
                None => Err(HttpError::connect("no route")),
            }
        };
        self.requests.lock().expect("requests").push(request);
        Box::pin(async move { response })
    }
}

fn service_over(vendors: &Arc<StubVendors>, config: &CoreConfig) -> MarketDataService {
    let http: Arc<dyn HttpClient> = vendors.clone();
    let chain = ProviderChainBuilder::from_config(config)
        .with_http_client(http)
        .with_twelvedata_key("td-key")
        .with_finnhub_key("fh-key")
        .build();
    MarketDataService::with_chain(&config.cache, chain)
}

fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

#[tokio::test(start_paused = true)]
async fn when_primary_vendor_answers_quote_is_live_and_cached() {
    // Given: Twelve Data serving a quote
    let vendors = Arc::new(StubVendors::default().on(
        "https://api.twelvedata.com/quote",
        vec![Ok(HttpResponse::ok_json(TWELVEDATA_QUOTE))],
    ));
    let service = service_over(&vendors, &CoreConfig::default());

    // When: the same quote is read twice
    let first = service.quote(&symbol("tcs.ns")).await.expect("quote");
    let second = service.quote(&symbol("TCS")).await.expect("cached quote");

    // Then: one upstream request served both reads
    assert_eq!(first.provenance, Provenance::Live);
    assert_eq!(first.price, 3_820.5);
    assert_eq!(first.volume_formatted, "2.10M");
    assert_eq!(first, second);
    assert_eq!(vendors.total_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_primary_vendor_is_overloaded_secondary_vendor_answers() {
    // Given: Twelve Data returning 503 and Finnhub healthy
    let vendors = Arc::new(
        StubVendors::default()
            .on(
                "https://api.twelvedata.com/quote",
                vec![Ok(HttpResponse::with_status(503, "overloaded"))],
            )
            .on(
                "https://finnhub.io/api/v1/quote",
                vec![Ok(HttpResponse::ok_json(FINNHUB_QUOTE))],
            ),
    );
    let service = service_over(&vendors, &CoreConfig::default());

    // When: a quote is read
    let quote = service.quote(&symbol("TCS")).await.expect("quote");

    // Then: Twelve Data was retried once, Finnhub answered
    assert_eq!(vendors.requests_to("https://api.twelvedata.com/quote"), 2);
    assert_eq!(vendors.requests_to("https://finnhub.io/api/v1/quote"), 1);
    assert_eq!(quote.price, 3_815.25);
    assert_eq!(quote.percent_change, 0.4);
    assert_eq!(quote.provenance, Provenance::Live);
}

#[tokio::test(start_paused = true)]
async fn when_every_vendor_is_down_synthetic_data_is_served() {
    // Given: no route answers
    let vendors = Arc::new(StubVendors::default());
    let service = service_over(&vendors, &CoreConfig::default());

    // When: a series is read
    let series = service
        .historical(&symbol("INFY"), Period::OneMonth)
        .await
        .expect("series");

    // Then: synthetic bars are returned instead of an error
    assert_eq!(series.provenance, Provenance::Synthetic);
    assert_eq!(series.bars.len(), 30);
    assert!(series
        .bars
        .iter()
        .all(|bar| bar.low <= bar.open.min(bar.close) && bar.high >= bar.open.max(bar.close)));
}

#[tokio::test(start_paused = true)]
async fn when_real_data_is_required_and_vendors_fail_caller_sees_error_and_nothing_is_cached() {
    // Given: real-data-only mode and a vendor rejecting the symbol
    let vendors = Arc::new(
        StubVendors::default()
            .on(
                "https://api.twelvedata.com/profile",
                vec![Ok(HttpResponse::ok_json(
                    r#"{"code":404,"message":"symbol not found","status":"error"}"#,
                ))],
            )
            .on(
                "https://finnhub.io/api/v1/stock/profile2",
                vec![Ok(HttpResponse::ok_json("{}"))],
            ),
    );
    let config = CoreConfig::default().with_real_data_only(true);
    let service = service_over(&vendors, &config);

    // When: a profile is read
    let error = service.profile(&symbol("XYZ")).await.expect_err("no live data");

    // Then: the error reports both permanent failures and the cache stays empty
    assert_eq!(
        error,
        FetchError::RealDataUnavailable {
            key: String::from("profile:XYZ"),
            attempts: 2,
        }
    );
    assert_eq!(service.cache_stats().await.entry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn when_several_quotes_are_requested_results_keep_input_order() {
    // Given: Twelve Data serving every quote
    let vendors = Arc::new(StubVendors::default().on(
        "https://api.twelvedata.com/quote",
        vec![Ok(HttpResponse::ok_json(TWELVEDATA_QUOTE))],
    ));
    let service = service_over(&vendors, &CoreConfig::default());
    let symbols = [symbol("TCS"), symbol("INFY"), symbol("TCS")];

    // When: the batch is read
    let results = service.quotes(&symbols).await;

    // Then: one result per input, in order, with the repeated symbol fetched once
    assert_eq!(results.len(), 3);
    for (requested, result) in symbols.iter().zip(&results) {
        let quote = result.as_ref().expect("quote");
        assert_eq!(&quote.symbol, requested);
    }
    assert_eq!(vendors.total_requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn when_symbol_is_invalidated_next_read_goes_upstream() {
    // Given: a cached quote
    let vendors = Arc::new(StubVendors::default().on(
        "https://api.twelvedata.com/quote",
        vec![Ok(HttpResponse::ok_json(TWELVEDATA_QUOTE))],
    ));
    let service = service_over(&vendors, &CoreConfig::default());
    service.quote(&symbol("TCS")).await.expect("quote");

    // When: the symbol is invalidated and read again
    assert_eq!(service.invalidate_symbol(&symbol("TCS")).await, 1);
    service.quote(&symbol("TCS")).await.expect("quote");

    // Then: a second upstream request was made
    assert_eq!(vendors.total_requests(), 2);
}

#[tokio::test]
async fn when_no_credentials_are_configured_status_reports_unavailable_providers() {
    // Given: the default configuration without keys in demo mode
    let config = CoreConfig::default().with_mode(ChainMode::SyntheticOnly);
    let service = MarketDataService::new(&config).expect("service");

    // When: a quote is read and the status inspected
    let quote = service.quote(&symbol("HDFCBANK")).await.expect("quote");
    let status = service.status().await;

    // Then: synthetic data is served and both vendors show as unavailable
    assert_eq!(quote.provenance, Provenance::Synthetic);
    assert_eq!(status.providers.providers.len(), 2);
    assert!(status.providers.providers.iter().all(|provider| !provider.available));
    assert_eq!(status.providers.providers[0].id, ProviderId::Twelvedata);
    assert_eq!(status.cache.entry_count, 1);
    assert_eq!(status.cache.max_entries, CacheSettings::default().max_entries);
}
