//! Provider capability traits and the structured provider error.
//!
//! Each upstream vendor implements the three capability traits and the
//! umbrella [`DataSource`] trait. The [`ProviderChain`](crate::ProviderChain)
//! only ever talks to sources through these seams.
//!
//! | Capability | Trait | Record |
//! |------------|-------|--------|
//! | Quote | [`QuoteProvider`] | [`Quote`] |
//! | Historical | [`HistoricalProvider`] | [`HistoricalSeries`] |
//! | Profile | [`ProfileProvider`] | [`Profile`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::http_client::HttpError;
use crate::{HistoricalSeries, Period, Profile, ProviderId, Quote, Symbol};

/// Record category a source can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Quote,
    Historical,
    Profile,
}

impl Capability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Profile => "profile",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported capability matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub historical: bool,
    pub profile: bool,
}

impl CapabilitySet {
    pub const fn new(quote: bool, historical: bool, profile: bool) -> Self {
        Self {
            quote,
            historical,
            profile,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Quote => self.quote,
            Capability::Historical => self.historical,
            Capability::Profile => self.profile,
        }
    }

    pub fn supported(self) -> Vec<Capability> {
        [Capability::Quote, Capability::Historical, Capability::Profile]
            .into_iter()
            .filter(|capability| self.supports(*capability))
            .collect()
    }
}

/// Configuration-time availability of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

/// Immutable description of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub rank: u8,
    pub capabilities: CapabilitySet,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Provider failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Timeouts, 5xx, 408, 429, connection failures.
    Transient,
    /// Other 4xx, error payloads, malformed schema, empty data.
    Permanent,
    /// Missing credential.
    Unavailable,
    /// Capability not offered by the source.
    Unsupported,
}

const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Structured provider error. Absorbed by the chain; never reaches callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    status: Option<u16>,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
            status: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Permanent,
            message: message.into(),
            status: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            message: message.into(),
            status: None,
        }
    }

    pub fn unsupported(capability: Capability) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            message: format!("capability '{capability}' is not supported by this source"),
            status: None,
        }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = if status >= 500 || TRANSIENT_STATUSES.contains(&status) {
            ProviderErrorKind::Transient
        } else {
            ProviderErrorKind::Permanent
        };

        let snippet: String = body.chars().take(120).collect();
        Self {
            kind,
            message: format!("upstream returned status {status}: {snippet}"),
            status: Some(status),
        }
    }

    /// Classifies a vendor error code found inside a 200 payload.
    pub fn from_payload_code(code: u16, message: impl Into<String>) -> Self {
        let mut error = Self::from_status(code, "");
        error.message = format!("upstream error {code}: {}", message.into());
        error
    }

    pub fn malformed(detail: impl Display) -> Self {
        Self::permanent(format!("malformed upstream payload: {detail}"))
    }

    pub fn empty_data(detail: impl Into<String>) -> Self {
        Self::permanent(format!("upstream returned no data: {}", detail.into()))
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn retryable(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Transient)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Transient => "provider.transient",
            ProviderErrorKind::Permanent => "provider.permanent",
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::Unsupported => "provider.unsupported",
        }
    }
}

impl From<HttpError> for ProviderError {
    fn from(value: HttpError) -> Self {
        if value.retryable() {
            Self::transient(value.message())
        } else {
            Self::permanent(value.message())
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

pub trait QuoteProvider: Send + Sync {
    fn fetch_quote<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Quote>;
}

pub trait HistoricalProvider: Send + Sync {
    fn fetch_historical<'a>(
        &'a self,
        symbol: Symbol,
        period: Period,
    ) -> ProviderFuture<'a, HistoricalSeries>;
}

pub trait ProfileProvider: Send + Sync {
    fn fetch_profile<'a>(&'a self, symbol: Symbol) -> ProviderFuture<'a, Profile>;
}

/// Upstream data source.
///
/// Implementations must be `Send + Sync`; the chain shares them across tasks.
/// A source reporting [`Availability::Unavailable`] or lacking a capability is
/// skipped without any request being made.
pub trait DataSource: QuoteProvider + HistoricalProvider + ProfileProvider {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn availability(&self) -> Availability {
        Availability::Available
    }
}
