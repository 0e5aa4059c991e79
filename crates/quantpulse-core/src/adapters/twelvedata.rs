use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{count, decode, fetch_json, number};
use crate::data_source::{
    Availability, CapabilitySet, DataSource, HistoricalProvider, ProfileProvider, ProviderError,
    ProviderFuture, QuoteProvider,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::{
    Bar, HistoricalSeries, Period, Profile, Provenance, ProviderId, Quote, Symbol, UtcDateTime,
};

const BASE_URL: &str = "https://api.twelvedata.com";
const DEFAULT_TIMEOUT_MS: u64 = 8_000;

/// Twelve Data REST adapter. Primary upstream for NSE listings.
#[derive(Clone)]
pub struct TwelveDataAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    base_url: String,
    timeout_ms: u64,
}

impl std::fmt::Debug for TwelveDataAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwelveDataAdapter")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl TwelveDataAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: String::from(BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn request(&self, path: &str, symbol: &Symbol) -> Result<HttpRequest, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::unavailable("twelvedata api key not configured"))?;

        Ok(HttpRequest::get(format!("{}{path}", self.base_url))
            .with_query("symbol", vendor_symbol(symbol))
            .with_auth(&HttpAuth::query_param("apikey", key))
            .with_timeout_ms(self.timeout_ms))
    }

    async fn call(&self, request: HttpRequest) -> Result<Value, ProviderError> {
        let payload = fetch_json(self.http_client.as_ref(), ProviderId::Twelvedata, request).await?;
        check_error_payload(&payload)?;
        Ok(payload)
    }

    async fn quote(&self, symbol: Symbol) -> Result<Quote, ProviderError> {
        let payload: QuotePayload = decode(self.call(self.request("/quote", &symbol)?).await?)?;
        let price = payload
            .close
            .ok_or_else(|| ProviderError::empty_data(format!("no quote for {symbol}")))?;
        let previous_close = payload.previous_close.unwrap_or(price);
        let volume = count("volume", payload.volume)?;

        let mut quote = Quote::new(
            symbol,
            price,
            previous_close,
            volume,
            UtcDateTime::now(),
            Provenance::Live,
        )
        .map_err(ProviderError::malformed)?;

        if let Some(state) = payload.market_state() {
            quote = quote.with_market_state(state);
        }
        Ok(quote)
    }

    async fn historical(
        &self,
        symbol: Symbol,
        period: Period,
    ) -> Result<HistoricalSeries, ProviderError> {
        let (interval, output_size) = series_params(period);
        let request = self
            .request("/time_series", &symbol)?
            .with_query("interval", interval)
            .with_query("outputsize", output_size.to_string());

        let payload: SeriesPayload = decode(self.call(request).await?)?;
        if payload.values.is_empty() {
            return Err(ProviderError::empty_data(format!("no bars for {symbol} ({period})")));
        }

        let mut bars = payload
            .values
            .into_iter()
            .map(SeriesValue::into_bar)
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|bar| bar.ts);

        Ok(HistoricalSeries::new(symbol, period, bars, Provenance::Live))
    }

    async fn profile(&self, symbol: Symbol) -> Result<Profile, ProviderError> {
        let payload: ProfilePayload = decode(self.call(self.request("/profile", &symbol)?).await?)?;
        if payload.is_empty() {
            return Err(ProviderError::empty_data(format!("no profile for {symbol}")));
        }

        let name = payload
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| symbol.to_string());
        let employees = payload.employees.map(|value| count("employees", Some(value))).transpose()?;

        Profile::new(symbol, name, Provenance::Live)
            .with_description(payload.description)
            .with_classification(payload.sector, payload.industry)
            .with_employees(employees)
            .with_website(payload.website)
            .with_market_cap(payload.market_capitalization)
            .map_err(ProviderError::malformed)
    }
}

impl QuoteProvider for TwelveDataAdapter {
    fn fetch_quote<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Quote> {
        Box::pin(self.quote(symbol))
    }
}

impl HistoricalProvider for TwelveDataAdapter {
    fn fetch_historical<'a>(
        &'a self,
        symbol: Symbol,
        period: Period,
    ) -> ProviderFuture<'a, HistoricalSeries> {
        Box::pin(self.historical(symbol, period))
    }
}

impl ProfileProvider for TwelveDataAdapter {
    fn fetch_profile<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Profile> {
        Box::pin(self.profile(symbol))
    }
}

impl DataSource for TwelveDataAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Twelvedata
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn availability(&self) -> Availability {
        match self.api_key {
            Some(_) => Availability::Available,
            None => Availability::unavailable("twelvedata api key not configured"),
        }
    }
}

fn vendor_symbol(symbol: &Symbol) -> String {
    format!("{symbol}.NSE")
}

/// Interval and output size requested for each period.
fn series_params(period: Period) -> (&'static str, u32) {
    match period {
        Period::OneDay => ("1min", 78),
        Period::FiveDays => ("5min", 288),
        Period::OneMonth => ("1day", 30),
        Period::ThreeMonths => ("1day", 90),
        Period::SixMonths => ("1day", 180),
        Period::OneYear => ("1day", 365),
        Period::TwoYears => ("1week", 104),
        Period::FiveYears => ("1week", 260),
        Period::TenYears => ("1month", 120),
        Period::YearToDate => ("1day", 250),
        Period::Max => ("1month", 5_000),
    }
}

/// Twelve Data reports errors as `{"code": 400, "message": "...", "status": "error"}`
/// with HTTP 200.
fn check_error_payload(payload: &Value) -> Result<(), ProviderError> {
    let is_error = payload.get("status").and_then(Value::as_str) == Some("error")
        || payload.get("error").is_some();
    if !is_error {
        return Ok(());
    }

    let code = payload
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(400);
    let message = payload
        .get("message")
        .or_else(|| payload.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(ProviderError::from_payload_code(code, message))
}

#[derive(Debug, Deserialize)]
struct QuotePayload {
    #[serde(default, deserialize_with = "number")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    previous_close: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    volume: Option<f64>,
    #[serde(default)]
    market_state: Option<String>,
    #[serde(default)]
    is_market_open: Option<bool>,
}

impl QuotePayload {
    fn market_state(&self) -> Option<String> {
        self.market_state.clone().or_else(|| {
            self.is_market_open
                .map(|open| String::from(if open { "REGULAR" } else { "CLOSED" }))
        })
    }
}

#[derive(Debug, Deserialize)]
struct SeriesPayload {
    #[serde(default)]
    values: Vec<SeriesValue>,
}

#[derive(Debug, Deserialize)]
struct SeriesValue {
    datetime: String,
    #[serde(deserialize_with = "number")]
    open: Option<f64>,
    #[serde(deserialize_with = "number")]
    high: Option<f64>,
    #[serde(deserialize_with = "number")]
    low: Option<f64>,
    #[serde(deserialize_with = "number")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    volume: Option<f64>,
}

impl SeriesValue {
    fn into_bar(self) -> Result<Bar, ProviderError> {
        let ts = UtcDateTime::parse_vendor(&self.datetime).map_err(ProviderError::malformed)?;
        let field = |name: &'static str, value: Option<f64>| {
            value.ok_or_else(|| {
                ProviderError::malformed(format!("bar {} is missing {name}", self.datetime))
            })
        };

        Bar::new(
            ts,
            field("open", self.open)?,
            field("high", self.high)?,
            field("low", self.low)?,
            field("close", self.close)?,
            count("volume", self.volume)?,
        )
        .map_err(ProviderError::malformed)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProfilePayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default, deserialize_with = "number")]
    market_capitalization: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    employees: Option<f64>,
    #[serde(default)]
    website: Option<String>,
}

impl ProfilePayload {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.sector.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedHttpClient;
    use crate::data_source::ProviderErrorKind;
    use crate::http_client::{HttpError, HttpResponse};

    fn adapter(http: &Arc<ScriptedHttpClient>) -> TwelveDataAdapter {
        let client: Arc<dyn HttpClient> = http.clone();
        TwelveDataAdapter::new(client, Some(String::from("td-key")))
            .with_base_url("https://td.test/")
            .with_timeout_ms(1_500)
    }

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn quote_builds_request_and_normalizes_payload() {
        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"symbol":"TCS","close":"3500.456","previous_close":"3450.00","volume":"1200000","is_market_open":true}"#,
        ));

        let quote = adapter(&http).fetch_quote(symbol("tcs")).await.expect("quote");

        assert_eq!(quote.price, 3500.46);
        assert_eq!(quote.previous_close, 3450.0);
        assert_eq!(quote.change, 50.46);
        assert_eq!(quote.volume, 1_200_000);
        assert_eq!(quote.market_state, "REGULAR");
        assert_eq!(quote.currency, "INR");
        assert_eq!(quote.provenance, Provenance::Live);

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://td.test/quote");
        assert_eq!(requests[0].query.get("symbol").map(String::as_str), Some("TCS.NSE"));
        assert_eq!(requests[0].query.get("apikey").map(String::as_str), Some("td-key"));
        assert_eq!(requests[0].timeout_ms, 1_500);
    }

    #[tokio::test]
    async fn error_payload_is_classified_by_code() {
        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"code":429,"message":"run out of API credits","status":"error"}"#,
        ));
        let error = adapter(&http).fetch_quote(symbol("TCS")).await.expect_err("error payload");
        assert_eq!(error.kind(), ProviderErrorKind::Transient);

        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"code":404,"message":"symbol not found","status":"error"}"#,
        ));
        let error = adapter(&http).fetch_quote(symbol("TCS")).await.expect_err("error payload");
        assert_eq!(error.kind(), ProviderErrorKind::Permanent);
        assert!(error.message().contains("symbol not found"));
    }

    #[tokio::test]
    async fn historical_sorts_bars_and_maps_period() {
        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"status":"ok","values":[
                {"datetime":"2024-03-05","open":"101","high":"104","low":"100","close":"103","volume":"5000"},
                {"datetime":"2024-03-04","open":"99","high":"102","low":"98","close":"101","volume":"4000"}
            ]}"#,
        ));

        let series = adapter(&http)
            .fetch_historical(symbol("INFY"), Period::ThreeMonths)
            .await
            .expect("series");

        assert_eq!(series.bars.len(), 2);
        assert!(series.bars[0].ts < series.bars[1].ts);
        assert_eq!(series.bars[1].close, 103.0);

        let request = &http.requests()[0];
        assert_eq!(request.url, "https://td.test/time_series");
        assert_eq!(request.query.get("interval").map(String::as_str), Some("1day"));
        assert_eq!(request.query.get("outputsize").map(String::as_str), Some("90"));
    }

    #[tokio::test]
    async fn empty_and_malformed_series_are_permanent() {
        let http = Arc::new(ScriptedHttpClient::json(r#"{"status":"ok","values":[]}"#));
        let error = adapter(&http)
            .fetch_historical(symbol("INFY"), Period::OneMonth)
            .await
            .expect_err("empty");
        assert!(!error.retryable());

        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"values":[{"datetime":"2024-03-05","open":"110","high":"104","low":"100","close":"103"}]}"#,
        ));
        let error = adapter(&http)
            .fetch_historical(symbol("INFY"), Period::OneMonth)
            .await
            .expect_err("open above high");
        assert_eq!(error.kind(), ProviderErrorKind::Permanent);
    }

    #[tokio::test]
    async fn profile_formats_market_cap() {
        let http = Arc::new(ScriptedHttpClient::json(
            r#"{"name":"Reliance Industries","sector":"Energy","industry":"Oil & Gas","market_capitalization":17500000000000,"employees":236334,"website":"https://www.ril.com"}"#,
        ));

        let profile = adapter(&http).fetch_profile(symbol("RELIANCE")).await.expect("profile");
        assert_eq!(profile.name, "Reliance Industries");
        assert_eq!(profile.employees, Some(236_334));
        assert_eq!(profile.market_cap_formatted.as_deref(), Some("₹17.50L Cr"));
    }

    #[tokio::test]
    async fn transport_and_status_failures_map_to_kinds() {
        let http = Arc::new(ScriptedHttpClient::with_responses([
            Err(HttpError::timeout("deadline")),
            Ok(HttpResponse::with_status(503, "busy")),
            Ok(HttpResponse::with_status(401, "bad key")),
            Ok(HttpResponse::ok_json("not json")),
        ]));
        let source = adapter(&http);

        let kinds = [
            source.fetch_quote(symbol("TCS")).await.expect_err("timeout").kind(),
            source.fetch_quote(symbol("TCS")).await.expect_err("503").kind(),
            source.fetch_quote(symbol("TCS")).await.expect_err("401").kind(),
            source.fetch_quote(symbol("TCS")).await.expect_err("garbage").kind(),
        ];
        assert_eq!(
            kinds,
            [
                ProviderErrorKind::Transient,
                ProviderErrorKind::Transient,
                ProviderErrorKind::Permanent,
                ProviderErrorKind::Permanent,
            ]
        );
    }

    #[tokio::test]
    async fn missing_key_reports_unavailable_without_requests() {
        let http = Arc::new(ScriptedHttpClient::default());
        let client: Arc<dyn HttpClient> = http.clone();
        let source = TwelveDataAdapter::new(client, Some(String::from("  ")));

        assert!(!source.availability().is_available());
        let error = source.fetch_quote(symbol("TCS")).await.expect_err("no key");
        assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
        assert!(http.requests().is_empty());
        assert!(!format!("{source:?}").contains("td-key"));
    }
}
