//! Vendor adapters over the [`HttpClient`] transport seam.
//!
//! | Adapter | Base URL | Credential |
//! |---------|----------|------------|
//! | [`TwelveDataAdapter`] | `https://api.twelvedata.com` | `apikey` query parameter |
//! | [`FinnhubAdapter`] | `https://finnhub.io/api/v1` | `token` query parameter |
//!
//! Both adapters map transport failures and HTTP statuses through
//! [`ProviderError::from_status`], and treat payloads that fail to decode as
//! permanent failures.

mod finnhub;
mod twelvedata;

pub use finnhub::FinnhubAdapter;
pub use twelvedata::TwelveDataAdapter;

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::data_source::ProviderError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::ProviderId;

/// Sends `request` and returns the decoded JSON body of a 2xx response.
async fn fetch_json(
    http: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> Result<Value, ProviderError> {
    tracing::debug!(provider = %provider, url = %request.url, "upstream request");

    let response = http.execute(request).await?;
    if !response.is_success() {
        return Err(ProviderError::from_status(response.status, &response.body));
    }

    serde_json::from_str(&response.body).map_err(ProviderError::malformed)
}

fn decode<T>(value: Value) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(ProviderError::malformed)
}

/// Vendors send numbers either as JSON numbers or as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Numeric>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Numeric::Number(value)) => Ok(Some(value)),
        Some(Numeric::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Numeric::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number '{text}'"))),
    }
}

fn count(field: &'static str, value: Option<f64>) -> Result<u64, ProviderError> {
    match value {
        None => Ok(0),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value.round() as u64),
        Some(value) => Err(ProviderError::malformed(format!("{field} is {value}"))),
    }
}

#[cfg(test)]
mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::http_client::{
        HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
    };

    /// Replays canned responses in order and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        pub(crate) fn with_responses(
            responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn json(body: &str) -> Self {
            Self::with_responses([Ok(HttpResponse::ok_json(body))])
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().expect("request log").clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
            self.requests.lock().expect("request log").push(request);
            let next = self.responses.lock().expect("script").pop_front();
            Box::pin(async move {
                next.unwrap_or_else(|| Err(HttpError::connect("no scripted response left")))
            })
        }
    }
}
