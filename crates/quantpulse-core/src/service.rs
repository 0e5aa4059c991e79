//! Market data façade: one cache orchestrator over one provider chain.
//!
//! Every read goes through [`CacheOrchestrator::get_or_fetch`] with a producer
//! that traverses the [`ProviderChain`]. Upstream failures are absorbed by the
//! chain, so with the synthetic fallback enabled reads only fail on internal
//! defects.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::cache::{CacheKey, CacheMode, CacheOrchestrator, CacheSettings, CacheStats};
use crate::chain::{ChainOutcome, ProviderChain, ProviderChainBuilder, ProviderChainStatus};
use crate::{
    ConfigError, CoreConfig, DataRecord, FetchError, HistoricalSeries, Period, Profile, Quote,
    Symbol,
};

/// Combined chain and cache snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub providers: ProviderChainStatus,
    pub cache: CacheStats,
}

/// Cached, fallback-backed reads of quotes, series and profiles.
#[derive(Debug, Clone)]
pub struct MarketDataService {
    cache: CacheOrchestrator<DataRecord>,
    chain: Arc<ProviderChain>,
    cache_mode: CacheMode,
}

impl MarketDataService {
    /// Builds the chain from `config`, using the reqwest transport.
    pub fn new(config: &CoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let chain = ProviderChainBuilder::from_config(config).build();
        Ok(Self::with_chain(&config.cache, chain))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(&CoreConfig::from_env()?)
    }

    pub fn with_chain(settings: &CacheSettings, chain: ProviderChain) -> Self {
        Self {
            cache: CacheOrchestrator::new(settings),
            chain: Arc::new(chain),
            cache_mode: CacheMode::Use,
        }
    }

    /// Cache interaction for every read made through this handle.
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn cache(&self) -> &CacheOrchestrator<DataRecord> {
        &self.cache
    }

    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let key = CacheKey::quote(symbol);
        let request = symbol.clone();
        let record = self
            .load(key.clone(), move |chain| async move {
                let outcome = chain.quote(&request).await?;
                log_outcome(&request, "quote", &outcome);
                Ok(DataRecord::Quote(outcome.data))
            })
            .await?;

        match record.as_ref() {
            DataRecord::Quote(quote) => Ok(quote.clone()),
            other => Err(mismatch(&key, other)),
        }
    }

    pub async fn historical(
        &self,
        symbol: &Symbol,
        period: Period,
    ) -> Result<HistoricalSeries, FetchError> {
        let key = CacheKey::historical(symbol, period);
        let request = symbol.clone();
        let record = self
            .load(key.clone(), move |chain| async move {
                let outcome = chain.historical(&request, period).await?;
                log_outcome(&request, "historical", &outcome);
                Ok(DataRecord::Historical(outcome.data))
            })
            .await?;

        match record.as_ref() {
            DataRecord::Historical(series) => Ok(series.clone()),
            other => Err(mismatch(&key, other)),
        }
    }

    pub async fn profile(&self, symbol: &Symbol) -> Result<Profile, FetchError> {
        let key = CacheKey::profile(symbol);
        let request = symbol.clone();
        let record = self
            .load(key.clone(), move |chain| async move {
                let outcome = chain.profile(&request).await?;
                log_outcome(&request, "profile", &outcome);
                Ok(DataRecord::Profile(outcome.data))
            })
            .await?;

        match record.as_ref() {
            DataRecord::Profile(profile) => Ok(profile.clone()),
            other => Err(mismatch(&key, other)),
        }
    }

    /// Fetches quotes concurrently. Results follow the input order; repeated
    /// symbols share one fetch.
    pub async fn quotes(&self, symbols: &[Symbol]) -> Vec<Result<Quote, FetchError>> {
        let mut tasks = JoinSet::new();
        for (index, symbol) in symbols.iter().enumerate() {
            let service = self.clone();
            let symbol = symbol.clone();
            tasks.spawn(async move { (index, service.quote(&symbol).await) });
        }

        let mut results: Vec<Option<Result<Quote, FetchError>>> = vec![None; symbols.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(error) => tracing::error!(error = %error, "quote task failed"),
            }
        }

        symbols
            .iter()
            .zip(results)
            .map(|(symbol, result)| {
                result.unwrap_or_else(|| {
                    Err(FetchError::Aborted {
                        key: CacheKey::quote(symbol).to_string(),
                    })
                })
            })
            .collect()
    }

    /// Drops every cached record for `symbol`, across categories and periods.
    pub async fn invalidate_symbol(&self, symbol: &Symbol) -> usize {
        let removed = self.cache.invalidate_identifier(symbol.as_str()).await;
        tracing::info!(symbol = %symbol, removed, "cache invalidated for symbol");
        removed
    }

    pub async fn invalidate_all(&self) -> usize {
        let removed = self.cache.invalidate_all().await;
        tracing::info!(removed, "cache cleared");
        removed
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn provider_chain_status(&self) -> ProviderChainStatus {
        self.chain.status()
    }

    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            providers: self.provider_chain_status(),
            cache: self.cache_stats().await,
        }
    }

    /// Stops background refreshes and waits up to `timeout` for running ones.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cache.shutdown(timeout).await
    }

    async fn load<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<DataRecord>, FetchError>
    where
        F: FnOnce(Arc<ProviderChain>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<DataRecord, FetchError>> + Send + 'static,
    {
        let chain = Arc::clone(&self.chain);
        self.cache
            .get_or_fetch_with(key, self.cache_mode, move || fetch(chain))
            .await
    }
}

fn log_outcome<T>(symbol: &Symbol, category: &'static str, outcome: &ChainOutcome<T>) {
    tracing::debug!(
        symbol = %symbol,
        category,
        selected = ?outcome.selected,
        source_chain = ?outcome.source_chain,
        failures = outcome.failures.len(),
        latency_ms = outcome.latency_ms,
        "chain outcome"
    );
}

fn mismatch(key: &CacheKey, found: &DataRecord) -> FetchError {
    tracing::error!(key = %key, found = found.kind(), "cache holds unexpected record variant");
    FetchError::RecordMismatch {
        key: key.to_string(),
        found: found.kind(),
    }
}
