use thiserror::Error;

/// Validation and contract errors exposed by `quantpulse-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid period '{value}', expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max")]
    InvalidPeriod { value: String },
    #[error("invalid provider '{value}', expected one of twelvedata, finnhub")]
    InvalidProvider { value: String },
    #[error("invalid provider mode '{value}', expected one of auto, twelvedata, finnhub, demo")]
    InvalidProviderMode { value: String },
    #[error("invalid cache category '{value}', expected one of quote, historical, profile")]
    InvalidCategory { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp out of range: {value}")]
    TimestampOutOfRange { value: i64 },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
}

/// Configuration errors raised while reading `QUANTPULSE_*` settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{category} cache ttl must be greater than zero")]
    ZeroTtl { category: &'static str },
    #[error("{category} cache max age ({max_age_secs}s) must not be shorter than its ttl ({ttl_secs}s)")]
    MaxAgeBelowTtl {
        category: &'static str,
        ttl_secs: u64,
        max_age_secs: u64,
    },
    #[error("cache max entries must be greater than zero")]
    ZeroCapacity,
}

/// Caller-visible failure of a cached fetch.
///
/// Every waiter on a coalesced execution receives an identical clone of the
/// same error value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no live data for '{key}' after {attempts} provider attempt(s) and synthetic fallback is disabled")]
    RealDataUnavailable { key: String, attempts: usize },

    #[error("provider chain exhausted for '{key}': synthetic generator failed: {reason}")]
    ExhaustedChain { key: String, reason: String },

    #[error("shared fetch for '{key}' ended without producing a result")]
    Aborted { key: String },

    #[error("fetch for '{key}' did not complete within {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    #[error("cache entry '{key}' holds a '{found}' record")]
    RecordMismatch { key: String, found: &'static str },

    #[error("fetch for '{key}' failed: {message}")]
    Producer { key: String, message: String },
}

impl FetchError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RealDataUnavailable { .. } => "fetch.real_data_unavailable",
            Self::ExhaustedChain { .. } => "fetch.exhausted_chain",
            Self::Aborted { .. } => "fetch.aborted",
            Self::Timeout { .. } => "fetch.timeout",
            Self::RecordMismatch { .. } => "fetch.record_mismatch",
            Self::Producer { .. } => "fetch.producer",
        }
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
