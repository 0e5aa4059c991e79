//! CLI argument definitions for QuantPulse.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Latest quotes for one or more symbols |
//! | `history` | Historical OHLCV series for a period |
//! | `profile` | Company profile |
//! | `sources` | Provider chain layout and availability |
//! | `status` | Provider chain plus cache statistics |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--provider` | `QUANTPULSE_PROVIDER` or `auto` | Provider selection |
//! | `--real-only` | `false` | Fail instead of serving synthetic data |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timeout-ms` | `QUANTPULSE_ATTEMPT_TIMEOUT_MS` or `8000` | Per-attempt timeout |
//! | `--cache` | `use` | Cache interaction (`use`, `refresh`, `bypass`) |
//!
//! # Examples
//!
//! ```bash
//! quantpulse quote RELIANCE TCS
//! quantpulse history INFY --period 6mo --pretty
//! quantpulse --provider demo profile HDFCBANK
//! quantpulse --real-only quote TCS
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use quantpulse_core::{CacheMode, ChainMode, ProviderId};

/// QuantPulse - cached, fault-tolerant market data for NSE listings
#[derive(Debug, Parser)]
#[command(
    name = "quantpulse",
    author,
    version,
    about = "Cached, fault-tolerant market data CLI",
    long_about = "QuantPulse reads quotes, historical series and company profiles through a \
cache with stale-while-revalidate semantics and an ordered provider fallback chain \
(Twelve Data, Finnhub). When every provider fails, synthetic data flagged as such is \
served unless --real-only is given.\n\
\n\
Credentials are read from QUANTPULSE_TWELVEDATA_API_KEY and QUANTPULSE_FINNHUB_API_KEY."
)]
pub struct Cli {
    /// Provider selection; overrides QUANTPULSE_PROVIDER.
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderSelector>,

    /// Never serve synthetic data; exit with code 3 when no provider answers.
    #[arg(long, global = true, default_value_t = false)]
    pub real_only: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Per-attempt provider timeout in milliseconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Cache interaction for this invocation.
    #[arg(long, global = true, value_enum, default_value_t = CacheSelector::Use)]
    pub cache: CacheSelector,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheSelector {
    /// Serve cached entries, refreshing stale ones in the background.
    Use,
    /// Skip cached entries, fetch and store.
    Refresh,
    /// Fetch without touching the cache.
    Bypass,
}

impl From<CacheSelector> for CacheMode {
    fn from(selector: CacheSelector) -> Self {
        match selector {
            CacheSelector::Use => CacheMode::Use,
            CacheSelector::Refresh => CacheMode::Refresh,
            CacheSelector::Bypass => CacheMode::Bypass,
        }
    }
}

/// Provider selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderSelector {
    /// Every configured provider in rank order.
    Auto,
    /// Twelve Data only, then synthetic.
    Twelvedata,
    /// Finnhub only, then synthetic.
    Finnhub,
    /// Synthetic data only; no network requests.
    Demo,
}

impl From<ProviderSelector> for ChainMode {
    fn from(selector: ProviderSelector) -> Self {
        match selector {
            ProviderSelector::Auto => ChainMode::Auto,
            ProviderSelector::Twelvedata => ChainMode::Pinned(ProviderId::Twelvedata),
            ProviderSelector::Finnhub => ChainMode::Pinned(ProviderId::Finnhub),
            ProviderSelector::Demo => ChainMode::SyntheticOnly,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch latest quote(s) for one or more symbols.
    ///
    ///   quantpulse quote RELIANCE
    ///   quantpulse quote TCS INFY.NS --pretty
    Quote(QuoteArgs),

    /// Fetch a historical OHLCV series.
    ///
    ///   quantpulse history INFY
    ///   quantpulse history INFY --period 1y
    History(HistoryArgs),

    /// Fetch a company profile.
    Profile(ProfileArgs),

    /// List providers in chain order with availability.
    Sources,

    /// Show provider chain and cache statistics.
    Status,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// One or more NSE symbols (e.g. RELIANCE, TCS.NS).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// Lookback period: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max.
    #[arg(long, default_value = "1mo")]
    pub period: String,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    pub symbol: String,
}
