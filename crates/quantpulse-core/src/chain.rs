use std::any::Any;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::adapters::{FinnhubAdapter, TwelveDataAdapter};
use crate::cache::CacheKey;
use crate::data_source::{
    Capability, DataSource, ProviderDescriptor, ProviderError, ProviderErrorKind, ProviderFuture,
};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::retry::RetryPolicy;
use crate::synthetic::SyntheticGenerator;
use crate::{
    CoreConfig, FetchError, HistoricalSeries, Period, Profile, ProviderId, Quote, Symbol,
    ValidationError,
};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(8);

/// Operator override of provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMode {
    /// Every configured provider in rank order, then synthetic.
    #[default]
    Auto,
    /// Only the given provider, then synthetic.
    Pinned(ProviderId),
    /// No upstream requests at all.
    SyntheticOnly,
}

impl ChainMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Pinned(provider) => provider.as_str(),
            Self::SyntheticOnly => "demo",
        }
    }

    fn admits(self, provider: ProviderId) -> bool {
        match self {
            Self::Auto => true,
            Self::Pinned(pinned) => pinned == provider,
            Self::SyntheticOnly => false,
        }
    }
}

impl Display for ChainMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChainMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "demo" | "synthetic" => Ok(Self::SyntheticOnly),
            other => ProviderId::from_str(other).map(Self::Pinned).map_err(|_| {
                ValidationError::InvalidProviderMode {
                    value: value.to_owned(),
                }
            }),
        }
    }
}

impl Serialize for ChainMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

/// Where a chain outcome's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Provider(ProviderId),
    Synthetic,
}

/// One absorbed provider failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: ProviderErrorKind,
    pub code: &'static str,
    pub message: String,
    /// Requests actually sent; zero for skipped providers.
    pub attempts: u32,
}

impl ProviderFailure {
    fn new(provider: ProviderId, error: &ProviderError, attempts: u32) -> Self {
        Self {
            provider,
            kind: error.kind(),
            code: error.code(),
            message: error.message().to_owned(),
            attempts,
        }
    }
}

/// Result of one traversal of the chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome<T> {
    pub data: T,
    pub selected: Selection,
    /// Providers that received at least one request, in order.
    pub source_chain: Vec<ProviderId>,
    pub failures: Vec<ProviderFailure>,
    pub latency_ms: u64,
}

impl<T> ChainOutcome<T> {
    pub const fn is_synthetic(&self) -> bool {
        matches!(self.selected, Selection::Synthetic)
    }
}

/// Traversal knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSettings {
    pub mode: ChainMode,
    /// Disables the synthetic fallback.
    pub real_data_only: bool,
    pub attempt_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            mode: ChainMode::Auto,
            real_data_only: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Snapshot reported by [`ProviderChain::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderChainStatus {
    pub mode: ChainMode,
    pub real_data_only: bool,
    pub attempt_timeout_ms: u64,
    pub max_retries: u32,
    pub providers: Vec<ProviderDescriptor>,
}

struct RankedSource {
    descriptor: ProviderDescriptor,
    source: Arc<dyn DataSource>,
}

/// Ordered fallback over upstream sources with a synthetic last resort.
///
/// Provider errors never escape: each is logged and recorded in
/// [`ChainOutcome::failures`]. The only caller-visible errors are
/// [`FetchError::RealDataUnavailable`] when synthetic data is disabled and
/// [`FetchError::ExhaustedChain`] when the generator itself panics.
pub struct ProviderChain {
    sources: Vec<RankedSource>,
    settings: ChainSettings,
    synthetic: SyntheticGenerator,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.descriptors())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProviderChain {
    /// Ranks sources by [`ProviderId::default_rank`].
    pub fn new(sources: Vec<Arc<dyn DataSource>>, settings: ChainSettings) -> Self {
        let ranked = sources
            .into_iter()
            .map(|source| (source.id().default_rank(), source))
            .collect();
        Self::with_ranks(ranked, settings)
    }

    /// Lower ranks are tried first; ties keep insertion order.
    pub fn with_ranks(sources: Vec<(u8, Arc<dyn DataSource>)>, settings: ChainSettings) -> Self {
        let mut sources = sources
            .into_iter()
            .map(|(rank, source)| {
                let availability = source.availability();
                RankedSource {
                    descriptor: ProviderDescriptor {
                        id: source.id(),
                        rank,
                        capabilities: source.capabilities(),
                        available: availability.is_available(),
                        reason: availability.reason().map(str::to_owned),
                    },
                    source,
                }
            })
            .collect::<Vec<_>>();
        sources.sort_by_key(|ranked| ranked.descriptor.rank);

        Self {
            sources,
            settings,
            synthetic: SyntheticGenerator::new(),
        }
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn synthetic(&self) -> &SyntheticGenerator {
        &self.synthetic
    }

    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.sources
            .iter()
            .map(|ranked| ranked.descriptor.clone())
            .collect()
    }

    pub fn status(&self) -> ProviderChainStatus {
        ProviderChainStatus {
            mode: self.settings.mode,
            real_data_only: self.settings.real_data_only,
            attempt_timeout_ms: duration_ms(self.settings.attempt_timeout),
            max_retries: self.settings.retry.max_retries,
            providers: self.descriptors(),
        }
    }

    pub async fn quote(&self, symbol: &Symbol) -> Result<ChainOutcome<Quote>, FetchError> {
        let key = CacheKey::quote(symbol);
        let request = symbol.clone();
        self.traverse(
            Capability::Quote,
            &key,
            move |source| source.fetch_quote(request.clone()),
            || self.synthetic.quote(symbol),
        )
        .await
    }

    pub async fn historical(
        &self,
        symbol: &Symbol,
        period: Period,
    ) -> Result<ChainOutcome<HistoricalSeries>, FetchError> {
        let key = CacheKey::historical(symbol, period);
        let request = symbol.clone();
        self.traverse(
            Capability::Historical,
            &key,
            move |source| source.fetch_historical(request.clone(), period),
            || self.synthetic.historical(symbol, period),
        )
        .await
    }

    pub async fn profile(&self, symbol: &Symbol) -> Result<ChainOutcome<Profile>, FetchError> {
        let key = CacheKey::profile(symbol);
        let request = symbol.clone();
        self.traverse(
            Capability::Profile,
            &key,
            move |source| source.fetch_profile(request.clone()),
            || self.synthetic.profile(symbol),
        )
        .await
    }

    async fn traverse<T, F, S>(
        &self,
        capability: Capability,
        key: &CacheKey,
        mut invoke: F,
        synthesize: S,
    ) -> Result<ChainOutcome<T>, FetchError>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> ProviderFuture<'a, T>,
        S: FnOnce() -> T,
    {
        let started = Instant::now();
        let retry = &self.settings.retry;
        let mut failures = Vec::new();
        let mut source_chain = Vec::new();
        let mut requests = 0_usize;

        let mut candidates = Vec::new();
        for ranked in &self.sources {
            let descriptor = &ranked.descriptor;
            if !self.settings.mode.admits(descriptor.id) {
                continue;
            }
            let skipped = if !descriptor.available {
                Some(ProviderError::unavailable(
                    descriptor.reason.as_deref().unwrap_or("provider unavailable"),
                ))
            } else if !descriptor.capabilities.supports(capability) {
                Some(ProviderError::unsupported(capability))
            } else {
                None
            };

            match skipped {
                Some(error) => {
                    tracing::debug!(
                        provider = %descriptor.id,
                        key = %key,
                        reason = %error,
                        "provider skipped"
                    );
                    failures.push(ProviderFailure::new(descriptor.id, &error, 0));
                }
                None => candidates.push(ranked),
            }
        }

        let budget = self
            .settings
            .attempt_timeout
            .saturating_mul(retry.attempts_per_provider())
            .saturating_mul(u32::try_from(candidates.len()).unwrap_or(u32::MAX));
        let deadline = started + budget;

        'providers: for ranked in candidates {
            let provider = ranked.descriptor.id;
            let mut attempt = 0_u32;

            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    let error = ProviderError::transient("chain time budget exhausted");
                    tracing::warn!(provider = %provider, key = %key, "chain time budget exhausted");
                    failures.push(ProviderFailure::new(provider, &error, attempt));
                    break 'providers;
                }

                if attempt == 0 {
                    source_chain.push(provider);
                }
                requests += 1;
                let limit = remaining.min(self.settings.attempt_timeout);
                let result = tokio::time::timeout(limit, invoke(ranked.source.as_ref()))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::transient(format!(
                            "attempt timed out after {}ms",
                            duration_ms(limit)
                        )))
                    });

                match result {
                    Ok(data) => {
                        if !failures.is_empty() {
                            tracing::info!(
                                provider = %provider,
                                key = %key,
                                failed = failures.len(),
                                "provider fallback succeeded"
                            );
                        }
                        return Ok(ChainOutcome {
                            data,
                            selected: Selection::Provider(provider),
                            source_chain,
                            failures,
                            latency_ms: elapsed_ms(started),
                        });
                    }
                    Err(error) => {
                        tracing::warn!(
                            provider = %provider,
                            key = %key,
                            attempt = attempt + 1,
                            code = error.code(),
                            error = %error.message(),
                            "provider attempt failed"
                        );

                        if retry.should_retry(&error, attempt) {
                            tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                            attempt += 1;
                            continue;
                        }

                        failures.push(ProviderFailure::new(provider, &error, attempt + 1));
                        break;
                    }
                }
            }
        }

        if self.settings.real_data_only {
            tracing::warn!(key = %key, requests, "no live data and synthetic fallback disabled");
            return Err(FetchError::RealDataUnavailable {
                key: key.to_string(),
                attempts: requests,
            });
        }

        match catch_unwind(AssertUnwindSafe(synthesize)) {
            Ok(data) => {
                tracing::warn!(key = %key, failed = failures.len(), "serving synthetic data");
                Ok(ChainOutcome {
                    data,
                    selected: Selection::Synthetic,
                    source_chain,
                    failures,
                    latency_ms: elapsed_ms(started),
                })
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(key = %key, reason = %reason, "synthetic generator panicked");
                Err(FetchError::ExhaustedChain {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

/// Builds a [`ProviderChain`] once at startup.
///
/// With no explicit sources, both vendor adapters are registered; an adapter
/// without a credential reports itself unavailable and is skipped.
///
/// | Provider | Primary env var | Fallback env var |
/// |----------|-----------------|------------------|
/// | Twelve Data | `QUANTPULSE_TWELVEDATA_API_KEY` | `TWELVEDATA_API_KEY` |
/// | Finnhub | `QUANTPULSE_FINNHUB_API_KEY` | `FINNHUB_API_KEY` |
#[derive(Default)]
pub struct ProviderChainBuilder {
    sources: Vec<(u8, Arc<dyn DataSource>)>,
    settings: ChainSettings,
    http_client: Option<Arc<dyn HttpClient>>,
    twelvedata_api_key: Option<String>,
    finnhub_api_key: Option<String>,
}

impl ProviderChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies mode, timeouts, retry policy and credentials from `config`.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            settings: config.chain.clone(),
            twelvedata_api_key: config.twelvedata_api_key.clone(),
            finnhub_api_key: config.finnhub_api_key.clone(),
            ..Self::default()
        }
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_twelvedata_key(mut self, key: impl Into<String>) -> Self {
        self.twelvedata_api_key = Some(key.into());
        self
    }

    pub fn with_finnhub_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Registers an explicit source at its default rank.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.push((source.id().default_rank(), source));
        self
    }

    pub fn with_ranked_source(mut self, rank: u8, source: Arc<dyn DataSource>) -> Self {
        self.sources.push((rank, source));
        self
    }

    pub fn with_settings(mut self, settings: ChainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_mode(mut self, mode: ChainMode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn with_real_data_only(mut self, real_data_only: bool) -> Self {
        self.settings.real_data_only = real_data_only;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.settings.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.settings.retry = retry;
        self
    }

    pub fn build(self) -> ProviderChain {
        let mut sources = self.sources;
        if sources.is_empty() {
            let http: Arc<dyn HttpClient> = self
                .http_client
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
            let timeout_ms = duration_ms(self.settings.attempt_timeout);

            let twelvedata: Arc<dyn DataSource> = Arc::new(
                TwelveDataAdapter::new(Arc::clone(&http), self.twelvedata_api_key)
                    .with_timeout_ms(timeout_ms),
            );
            let finnhub: Arc<dyn DataSource> = Arc::new(
                FinnhubAdapter::new(http, self.finnhub_api_key).with_timeout_ms(timeout_ms),
            );
            sources.push((ProviderId::Twelvedata.default_rank(), twelvedata));
            sources.push((ProviderId::Finnhub.default_rank(), finnhub));
        }

        let chain = ProviderChain::with_ranks(sources, self.settings);
        for descriptor in chain.descriptors() {
            tracing::info!(
                provider = %descriptor.id,
                rank = descriptor.rank,
                available = descriptor.available,
                reason = descriptor.reason.as_deref().unwrap_or(""),
                "provider registered"
            );
        }
        tracing::info!(
            mode = %chain.settings.mode,
            real_data_only = chain.settings.real_data_only,
            "provider chain ready"
        );
        chain
    }
}
