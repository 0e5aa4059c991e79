//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `QUANTPULSE_PROVIDER` | `auto` (`twelvedata`, `finnhub`, `demo`) |
//! | `QUANTPULSE_REAL_DATA_ONLY` | `false` |
//! | `QUANTPULSE_CACHE_MAX_ENTRIES` | `10000` |
//! | `QUANTPULSE_QUOTE_TTL_SECS` | `60` |
//! | `QUANTPULSE_HISTORICAL_TTL_SECS` | `300` |
//! | `QUANTPULSE_PROFILE_TTL_SECS` | `86400` |
//! | `QUANTPULSE_{QUOTE,HISTORICAL,PROFILE}_MAX_AGE_SECS` | twice the ttl |
//! | `QUANTPULSE_ATTEMPT_TIMEOUT_MS` | `8000` |
//! | `QUANTPULSE_RETRY_DELAY_MS` | `200` (`0` disables the retry) |
//! | `QUANTPULSE_MAX_BACKGROUND_TASKS` | `256` |
//! | `QUANTPULSE_FETCH_TIMEOUT_MS` | unset (wait for the shared fetch) |
//! | `QUANTPULSE_TWELVEDATA_API_KEY` / `TWELVEDATA_API_KEY` | unset |
//! | `QUANTPULSE_FINNHUB_API_KEY` / `FINNHUB_API_KEY` | unset |

use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CachePolicy, CacheSettings, Category};
use crate::chain::{ChainMode, ChainSettings};
use crate::retry::RetryPolicy;
use crate::ConfigError;

const PROVIDER: &str = "QUANTPULSE_PROVIDER";
const REAL_DATA_ONLY: &str = "QUANTPULSE_REAL_DATA_ONLY";
const CACHE_MAX_ENTRIES: &str = "QUANTPULSE_CACHE_MAX_ENTRIES";
const ATTEMPT_TIMEOUT_MS: &str = "QUANTPULSE_ATTEMPT_TIMEOUT_MS";
const RETRY_DELAY_MS: &str = "QUANTPULSE_RETRY_DELAY_MS";
const MAX_BACKGROUND_TASKS: &str = "QUANTPULSE_MAX_BACKGROUND_TASKS";
const FETCH_TIMEOUT_MS: &str = "QUANTPULSE_FETCH_TIMEOUT_MS";

const TTL_VARS: [(Category, &str, &str); 3] = [
    (
        Category::Quote,
        "QUANTPULSE_QUOTE_TTL_SECS",
        "QUANTPULSE_QUOTE_MAX_AGE_SECS",
    ),
    (
        Category::Historical,
        "QUANTPULSE_HISTORICAL_TTL_SECS",
        "QUANTPULSE_HISTORICAL_MAX_AGE_SECS",
    ),
    (
        Category::Profile,
        "QUANTPULSE_PROFILE_TTL_SECS",
        "QUANTPULSE_PROFILE_MAX_AGE_SECS",
    ),
];

/// Complete core configuration.
#[derive(Clone, Default, PartialEq)]
pub struct CoreConfig {
    pub cache: CacheSettings,
    pub chain: ChainSettings,
    pub twelvedata_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
}

// Keys stay out of debug output.
impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache", &self.cache)
            .field("chain", &self.chain)
            .field("twelvedata_api_key", &self.twelvedata_api_key.as_ref().map(|_| "***"))
            .field("finnhub_api_key", &self.finnhub_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CoreConfig {
    /// Reads `QUANTPULSE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = get(PROVIDER) {
            config.chain.mode =
                ChainMode::from_str(&value).map_err(|error| invalid(PROVIDER, &value, error))?;
        }
        if let Some(value) = get(REAL_DATA_ONLY) {
            config.chain.real_data_only = parse_bool(REAL_DATA_ONLY, &value)?;
        }
        if let Some(value) = get(CACHE_MAX_ENTRIES) {
            config.cache.max_entries = parse_number(CACHE_MAX_ENTRIES, &value)?;
        }
        if let Some(value) = get(MAX_BACKGROUND_TASKS) {
            config.cache.max_background_tasks = parse_number(MAX_BACKGROUND_TASKS, &value)?;
        }
        if let Some(value) = get(ATTEMPT_TIMEOUT_MS) {
            let millis: u64 = parse_number(ATTEMPT_TIMEOUT_MS, &value)?;
            if millis == 0 {
                return Err(invalid(ATTEMPT_TIMEOUT_MS, &value, "must be greater than zero"));
            }
            config.chain.attempt_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = get(RETRY_DELAY_MS) {
            let millis: u64 = parse_number(RETRY_DELAY_MS, &value)?;
            config.chain.retry = if millis == 0 {
                RetryPolicy::no_retry()
            } else {
                RetryPolicy::fixed(Duration::from_millis(millis), 1)
            };
        }
        if let Some(value) = get(FETCH_TIMEOUT_MS) {
            let millis: u64 = parse_number(FETCH_TIMEOUT_MS, &value)?;
            config.cache.fetch_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }

        for (category, ttl_var, max_age_var) in TTL_VARS {
            let mut policy = config.cache.policies.for_category(category);
            if let Some(value) = get(ttl_var) {
                policy = CachePolicy::new(Duration::from_secs(parse_number(ttl_var, &value)?));
            }
            if let Some(value) = get(max_age_var) {
                let max_age = parse_number(max_age_var, &value)?;
                policy = policy.with_max_age(Duration::from_secs(max_age));
            }
            config.cache.policies.set(category, policy);
        }

        config.twelvedata_api_key =
            get("QUANTPULSE_TWELVEDATA_API_KEY").or_else(|| get("TWELVEDATA_API_KEY"));
        config.finnhub_api_key =
            get("QUANTPULSE_FINNHUB_API_KEY").or_else(|| get("FINNHUB_API_KEY"));

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()
    }

    pub fn with_mode(mut self, mode: ChainMode) -> Self {
        self.chain.mode = mode;
        self
    }

    pub fn with_real_data_only(mut self, real_data_only: bool) -> Self {
        self.chain.real_data_only = real_data_only;
        self
    }
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.parse::<T>().map_err(|error| invalid(name, value, error))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}
