//! # QuantPulse Core
//!
//! Cache-and-fallback data core for the QuantPulse market data service.
//!
//! ## Overview
//!
//! This crate sits between callers and volatile, rate-limited upstream
//! market data vendors:
//!
//! - **Cache store** with per-category ttl and max age, bounded capacity
//! - **Request coalescing** so concurrent reads of one key share one fetch
//! - **Stale-while-revalidate** orchestration with background refresh
//! - **Provider fallback chain** with one retry per provider
//! - **Synthetic data** as the last resort, flagged by provenance
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Vendor adapters (Twelve Data, Finnhub) |
//! | [`cache`] | Store, coalescer, orchestrator, background task set |
//! | [`chain`] | Ordered provider fallback with synthetic last resort |
//! | [`config`] | `QUANTPULSE_*` environment configuration |
//! | [`data_source`] | Capability traits and the provider error |
//! | [`domain`] | Domain records (Quote, HistoricalSeries, Profile) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport seam |
//! | [`retry`] | Retry policy and backoff |
//! | [`service`] | [`MarketDataService`] façade |
//! | [`source`] | Provider identifiers |
//! | [`synthetic`] | Deterministic synthetic generator |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quantpulse_core::{MarketDataService, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = MarketDataService::from_env()?;
//!     let quote = service.quote(&Symbol::parse("RELIANCE")?).await?;
//!     println!("{} {:.2} ({:?})", quote.symbol, quote.price, quote.provenance);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ MarketDataService│
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ CacheOrchestrator│────▶│ CacheStore       │
//! └────────┬─────────┘     └──────────────────┘
//!          │ miss / stale
//!          ▼
//! ┌──────────────────┐
//! │ RequestCoalescer │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ ProviderChain    │────▶│ Vendor adapters  │
//! └────────┬─────────┘     └──────────────────┘
//!          │ exhausted
//!          ▼
//! ┌──────────────────┐
//! │ SyntheticGenerator│
//! └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never reach callers; they are recorded on the chain
//! outcome. Callers only see [`FetchError`]:
//!
//! ```rust
//! use quantpulse_core::FetchError;
//!
//! fn describe(error: &FetchError) -> &'static str {
//!     match error {
//!         FetchError::RealDataUnavailable { .. } => "no live data",
//!         FetchError::Timeout { .. } => "gave up waiting",
//!         _ => "internal failure",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only and masked in `Debug`
//! - Input validation on all domain types

pub mod adapters;
pub mod cache;
pub mod chain;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod service;
pub mod source;
pub mod synthetic;

// Adapter implementations
pub use adapters::{FinnhubAdapter, TwelveDataAdapter};

// Caching
pub use cache::{
    CacheKey, CacheMode, CacheOrchestrator, CachePolicies, CachePolicy, CacheSettings,
    CacheStats, CacheStore, Category, RequestCoalescer,
};

// Provider chain
pub use chain::{
    ChainMode, ChainOutcome, ChainSettings, ProviderChain, ProviderChainBuilder,
    ProviderChainStatus, ProviderFailure, Selection,
};

// Configuration
pub use config::CoreConfig;

// Data source traits and types
pub use data_source::{
    Availability, Capability, CapabilitySet, DataSource, HistoricalProvider, ProfileProvider,
    ProviderDescriptor, ProviderError, ProviderErrorKind, ProviderFuture, QuoteProvider,
};

// Domain models
pub use domain::{
    format_market_cap, format_volume, validate_currency_code, Bar, DataRecord, HistoricalSeries,
    Period, Profile, Provenance, Quote, Symbol, UtcDateTime,
};

// Error types
pub use error::{ConfigError, CoreError, FetchError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Retry logic
pub use retry::RetryPolicy;

// Service façade
pub use service::{MarketDataService, ServiceStatus};

// Source identifiers
pub use source::ProviderId;

// Synthetic data
pub use synthetic::SyntheticGenerator;
