//! Contract tests every vendor adapter must satisfy.
//!
//! Each case pairs an adapter with canned vendor payloads; the assertions
//! are the same for all of them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use quantpulse_core::{
    CapabilitySet, DataSource, FinnhubAdapter, HttpClient, HttpError, HttpFuture, HttpRequest,
    HttpResponse, Period, Provenance, ProviderErrorKind, ProviderId, Symbol, TwelveDataAdapter,
};

#[derive(Default)]
struct CannedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
}

impl CannedHttpClient {
    fn replying(responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
        })
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        let next = self.responses.lock().expect("responses").pop_front();
        Box::pin(async move { next.unwrap_or_else(|| Err(HttpError::connect("nothing canned"))) })
    }
}

struct Payloads {
    quote: &'static str,
    historical: &'static str,
    profile: &'static str,
}

#[derive(Clone, Copy)]
struct ProviderCase {
    id: ProviderId,
    payloads: fn() -> Payloads,
    build: fn(Arc<dyn HttpClient>, Option<String>) -> Arc<dyn DataSource>,
}

fn twelvedata_payloads() -> Payloads {
    Payloads {
        quote: r#"{"symbol":"RELIANCE","close":"2950.10","previous_close":"2931.40","volume":"8500000"}"#,
        historical: r#"{"status":"ok","values":[
            {"datetime":"2024-03-06","open":"2940","high":"2962","low":"2931","close":"2950.1","volume":"8500000"},
            {"datetime":"2024-03-05","open":"2920","high":"2945","low":"2915","close":"2931.4","volume":"7200000"}
        ]}"#,
        profile: r#"{"name":"Reliance Industries Ltd","sector":"Energy","industry":"Oil & Gas Refining"}"#,
    }
}

fn finnhub_payloads() -> Payloads {
    Payloads {
        quote: r#"{"c":2950.1,"d":18.7,"dp":0.64,"pc":2931.4,"t":1709712000}"#,
        historical: r#"{"s":"ok","o":[2920,2940],"h":[2945,2962],"l":[2915,2931],"c":[2931.4,2950.1],"v":[7200000,8500000],"t":[1709596800,1709683200]}"#,
        profile: r#"{"name":"Reliance Industries Ltd","finnhubIndustry":"Energy","marketCapitalization":19950000}"#,
    }
}

fn provider_cases() -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            id: ProviderId::Twelvedata,
            payloads: twelvedata_payloads,
            build: |http, key| -> Arc<dyn DataSource> {
                Arc::new(TwelveDataAdapter::new(http, key))
            },
        },
        ProviderCase {
            id: ProviderId::Finnhub,
            payloads: finnhub_payloads,
            build: |http, key| -> Arc<dyn DataSource> { Arc::new(FinnhubAdapter::new(http, key)) },
        },
    ]
}

fn source(
    case: ProviderCase,
    responses: Vec<Result<HttpResponse, HttpError>>,
) -> Arc<dyn DataSource> {
    let http: Arc<dyn HttpClient> = CannedHttpClient::replying(responses);
    (case.build)(http, Some(String::from("contract-key")))
}

fn reliance() -> Symbol {
    Symbol::parse("RELIANCE").expect("valid symbol")
}

#[tokio::test]
async fn adapters_identify_themselves_and_offer_full_capabilities() {
    for case in provider_cases() {
        let source = source(case, Vec::new());
        assert_eq!(source.id(), case.id);
        assert_eq!(source.capabilities(), CapabilitySet::full(), "provider '{}'", case.id);
        assert!(source.availability().is_available(), "provider '{}'", case.id);
    }
}

#[tokio::test]
async fn quote_returns_valid_live_structure_for_all_providers() {
    for case in provider_cases() {
        let payloads = (case.payloads)();
        let source = source(case, vec![Ok(HttpResponse::ok_json(payloads.quote))]);

        let quote = source
            .fetch_quote(reliance())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.id));

        assert_eq!(quote.symbol.as_str(), "RELIANCE", "provider '{}': symbol", case.id);
        assert_eq!(quote.price, 2_950.1, "provider '{}': price", case.id);
        assert_eq!(quote.previous_close, 2_931.4, "provider '{}': previous close", case.id);
        assert_eq!(quote.change, 18.7, "provider '{}': change", case.id);
        assert_eq!(quote.currency, "INR", "provider '{}': currency", case.id);
        assert_eq!(quote.exchange, "NSE", "provider '{}': exchange", case.id);
        assert_eq!(quote.provenance, Provenance::Live, "provider '{}': provenance", case.id);
    }
}

#[tokio::test]
async fn historical_returns_ordered_bars_within_bounds_for_all_providers() {
    for case in provider_cases() {
        let payloads = (case.payloads)();
        let source = source(case, vec![Ok(HttpResponse::ok_json(payloads.historical))]);

        let series = source
            .fetch_historical(reliance(), Period::OneMonth)
            .await
            .unwrap_or_else(|error| panic!("provider '{}' historical failed: {error}", case.id));

        assert_eq!(series.period, Period::OneMonth);
        assert_eq!(series.bars.len(), 2, "provider '{}': bar count", case.id);
        assert!(series.bars[0].ts < series.bars[1].ts, "provider '{}': ascending", case.id);
        assert_eq!(series.bars[1].close, 2_950.1, "provider '{}': last close", case.id);
        for bar in &series.bars {
            assert!(bar.low <= bar.open && bar.open <= bar.high);
            assert!(bar.low <= bar.close && bar.close <= bar.high);
        }
    }
}

#[tokio::test]
async fn profile_returns_named_live_profile_for_all_providers() {
    for case in provider_cases() {
        let payloads = (case.payloads)();
        let source = source(case, vec![Ok(HttpResponse::ok_json(payloads.profile))]);

        let profile = source
            .fetch_profile(reliance())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' profile failed: {error}", case.id));

        assert_eq!(profile.name, "Reliance Industries Ltd", "provider '{}'", case.id);
        assert_eq!(profile.sector.as_deref(), Some("Energy"), "provider '{}'", case.id);
        assert_eq!(profile.provenance, Provenance::Live);
    }
}

#[tokio::test]
async fn failures_are_classified_identically_for_all_providers() {
    for case in provider_cases() {
        let source = source(
            case,
            vec![
                Err(HttpError::timeout("deadline elapsed")),
                Ok(HttpResponse::with_status(502, "bad gateway")),
                Ok(HttpResponse::with_status(403, "forbidden")),
                Ok(HttpResponse::ok_json("<html>maintenance</html>")),
            ],
        );

        let mut kinds = Vec::new();
        for _ in 0..4 {
            let error = source
                .fetch_quote(reliance())
                .await
                .expect_err("scripted failure");
            kinds.push(error.kind());
        }

        assert_eq!(
            kinds,
            vec![
                ProviderErrorKind::Transient,
                ProviderErrorKind::Transient,
                ProviderErrorKind::Permanent,
                ProviderErrorKind::Permanent,
            ],
            "provider '{}'",
            case.id
        );
    }
}

#[tokio::test]
async fn adapters_without_credentials_are_unavailable_and_send_nothing() {
    for case in provider_cases() {
        let http = CannedHttpClient::replying([Ok(HttpResponse::ok_json("{}"))]);
        let client: Arc<dyn HttpClient> = http.clone();
        let source = (case.build)(client, None);

        assert!(!source.availability().is_available(), "provider '{}'", case.id);
        let error = source.fetch_quote(reliance()).await.expect_err("no credential");
        assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
        assert_eq!(http.responses.lock().expect("responses").len(), 1, "provider '{}'", case.id);
    }
}
