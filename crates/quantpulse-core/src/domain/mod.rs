//! # Domain Models
//!
//! Canonical, source-independent record types served by the data core.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Quote`] | Last price with change against previous close |
//! | [`HistoricalSeries`] | OHLCV bars over a [`Period`] |
//! | [`Profile`] | Company profile snapshot |
//! | [`DataRecord`] | Any of the above, as stored in the cache |
//! | [`Provenance`] | Live vs synthetic origin flag |
//! | [`Symbol`] | Validated exchange-neutral ticker |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All constructors validate their invariants; invalid prices, inverted bars
//! and malformed symbols are rejected with a [`ValidationError`](crate::ValidationError).

mod models;
mod period;
mod symbol;
mod timestamp;

pub use models::{
    format_market_cap, format_volume, validate_currency_code, Bar, DataRecord, HistoricalSeries,
    Profile, Provenance, Quote,
};
pub(crate) use models::round2;
pub use period::Period;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
