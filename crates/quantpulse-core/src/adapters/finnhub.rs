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

const BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_TIMEOUT_MS: u64 = 8_000;

/// Finnhub REST adapter. Secondary upstream.
#[derive(Clone)]
pub struct FinnhubAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    base_url: String,
    timeout_ms: u64,
}

impl std::fmt::Debug for FinnhubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinnhubAdapter")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl FinnhubAdapter {
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
            .ok_or_else(|| ProviderError::unavailable("finnhub api key not configured"))?;

        Ok(HttpRequest::get(format!("{}{path}", self.base_url))
            .with_query("symbol", format!("{symbol}.NS"))
            .with_auth(&HttpAuth::query_param("token", key))
            .with_timeout_ms(self.timeout_ms))
    }

    async fn call(&self, request: HttpRequest) -> Result<Value, ProviderError> {
        let payload = fetch_json(self.http_client.as_ref(), ProviderId::Finnhub, request).await?;
        if let Some(message) = payload.get("error").and_then(Value::as_str) {
            return Err(ProviderError::permanent(format!("upstream error: {message}")));
        }
        Ok(payload)
    }

    async fn quote(&self, symbol: Symbol) -> Result<Quote, ProviderError> {
        let payload: QuotePayload = decode(self.call(self.request("/quote", &symbol)?).await?)?;

        // Unknown symbols come back as an all-zero quote.
        let price = payload
            .current
            .filter(|price| *price > 0.0)
            .ok_or_else(|| ProviderError::empty_data(format!("no quote for {symbol}")))?;
        let previous_close = payload.previous_close.unwrap_or(price);
        let as_of = payload
            .timestamp
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| UtcDateTime::from_unix_timestamp(seconds).ok())
            .unwrap_or_else(UtcDateTime::now);

        let quote = Quote::new(
            symbol,
            price,
            previous_close,
            count("volume", payload.volume)?,
            as_of,
            Provenance::Live,
        )
        .map_err(ProviderError::malformed)?;

        match (payload.change, payload.percent_change) {
            (Some(change), Some(percent_change)) => quote
                .with_change(change, percent_change)
                .map_err(ProviderError::malformed),
            _ => Ok(quote),
        }
    }

    async fn historical(
        &self,
        symbol: Symbol,
        period: Period,
    ) -> Result<HistoricalSeries, ProviderError> {
        let now = UtcDateTime::now();
        let from = now
            .checked_sub_days(period.lookback_days())
            .unwrap_or(now)
            .unix_timestamp();
        let request = self
            .request("/stock/candle", &symbol)?
            .with_query("resolution", resolution(period))
            .with_query("from", from.to_string())
            .with_query("to", now.unix_timestamp().to_string());

        let payload: CandlePayload = decode(self.call(request).await?)?;
        match payload.status.as_str() {
            "ok" => {}
            "no_data" => {
                return Err(ProviderError::empty_data(format!(
                    "no candles for {symbol} ({period})"
                )));
            }
            other => {
                return Err(ProviderError::permanent(format!("unexpected candle status '{other}'")));
            }
        }

        let bars = payload.into_bars()?;
        if bars.is_empty() {
            return Err(ProviderError::empty_data(format!("no candles for {symbol} ({period})")));
        }
        Ok(HistoricalSeries::new(symbol, period, bars, Provenance::Live))
    }

    async fn profile(&self, symbol: Symbol) -> Result<Profile, ProviderError> {
        let request = self.request("/stock/profile2", &symbol)?;
        let payload: ProfilePayload = decode(self.call(request).await?)?;
        let Some(name) = payload.name.filter(|name| !name.trim().is_empty()) else {
            return Err(ProviderError::empty_data(format!("no profile for {symbol}")));
        };
        let employees = payload
            .employee_total
            .map(|value| count("employeeTotal", Some(value)))
            .transpose()?;

        // Market capitalization is reported in millions.
        let market_cap = payload.market_capitalization.map(|millions| millions * 1_000_000.0);

        Profile::new(symbol, name, Provenance::Live)
            .with_description(payload.description)
            .with_classification(payload.finnhub_industry, payload.gsubind)
            .with_employees(employees)
            .with_website(payload.weburl)
            .with_market_cap(market_cap)
            .map_err(ProviderError::malformed)
    }
}

impl QuoteProvider for FinnhubAdapter {
    fn fetch_quote<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Quote> {
        Box::pin(self.quote(symbol))
    }
}

impl HistoricalProvider for FinnhubAdapter {
    fn fetch_historical<'a>(
        &'a self,
        symbol: Symbol,
        period: Period,
    ) -> ProviderFuture<'a, HistoricalSeries> {
        Box::pin(self.historical(symbol, period))
    }
}

impl ProfileProvider for FinnhubAdapter {
    fn fetch_profile<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Profile> {
        Box::pin(self.profile(symbol))
    }
}

impl DataSource for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn availability(&self) -> Availability {
        match self.api_key {
            Some(_) => Availability::Available,
            None => Availability::unavailable("finnhub api key not configured"),
        }
    }
}

fn resolution(period: Period) -> &'static str {
    match period {
        Period::OneDay => "5",
        Period::FiveDays => "15",
        Period::OneMonth | Period::ThreeMonths | Period::SixMonths | Period::OneYear => "D",
        _ => "W",
    }
}

#[derive(Debug, Deserialize)]
struct QuotePayload {
    #[serde(rename = "c", default, deserialize_with = "number")]
    current: Option<f64>,
    #[serde(rename = "d", default, deserialize_with = "number")]
    change: Option<f64>,
    #[serde(rename = "dp", default, deserialize_with = "number")]
    percent_change: Option<f64>,
    #[serde(rename = "pc", default, deserialize_with = "number")]
    previous_close: Option<f64>,
    #[serde(rename = "v", default, deserialize_with = "number")]
    volume: Option<f64>,
    #[serde(rename = "t", default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CandlePayload {
    #[serde(rename = "s")]
    status: String,
    #[serde(rename = "o", default)]
    open: Vec<f64>,
    #[serde(rename = "h", default)]
    high: Vec<f64>,
    #[serde(rename = "l", default)]
    low: Vec<f64>,
    #[serde(rename = "c", default)]
    close: Vec<f64>,
    #[serde(rename = "v", default)]
    volume: Vec<f64>,
    #[serde(rename = "t", default)]
    timestamps: Vec<i64>,
}

impl CandlePayload {
    fn into_bars(self) -> Result<Vec<Bar>, ProviderError> {
        let len = self.timestamps.len();
        let aligned = [&self.open, &self.high, &self.low, &self.close]
            .iter()
            .all(|column| column.len() == len);
        if !aligned {
            return Err(ProviderError::malformed("candle arrays differ in length"));
        }

        let mut bars = (0..len)
            .map(|index| {
                let ts = UtcDateTime::from_unix_timestamp(self.timestamps[index])
                    .map_err(ProviderError::malformed)?;
                Bar::new(
                    ts,
                    self.open[index],
                    self.high[index],
                    self.low[index],
                    self.close[index],
                    count("volume", self.volume.get(index).copied())?,
                )
                .map_err(ProviderError::malformed)
            })
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|bar| bar.ts);
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    finnhub_industry: Option<String>,
    #[serde(default)]
    gsubind: Option<String>,
    #[serde(default, deserialize_with = "number")]
    market_capitalization: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    employee_total: Option<f64>,
    #[serde(default)]
    weburl: Option<String>,
}
