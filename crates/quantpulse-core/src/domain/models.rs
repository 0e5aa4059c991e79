use serde::{Deserialize, Serialize};

use crate::{Period, Symbol, UtcDateTime, ValidationError};

const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_EXCHANGE: &str = "NSE";
const UNKNOWN_MARKET_STATE: &str = "UNKNOWN";

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Synthetic,
}

impl Provenance {
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic)
    }
}

/// Canonical last-trade quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: u64,
    pub volume_formatted: String,
    pub previous_close: f64,
    pub currency: String,
    pub exchange: String,
    pub market_state: String,
    pub as_of: UtcDateTime,
    pub provenance: Provenance,
}

impl Quote {
    /// Builds a quote, deriving change and percent change from the previous close.
    pub fn new(
        symbol: Symbol,
        price: f64,
        previous_close: f64,
        volume: u64,
        as_of: UtcDateTime,
        provenance: Provenance,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_non_negative("previous_close", previous_close)?;

        let change = price - previous_close;
        let percent_change = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Ok(Self {
            symbol,
            price: round2(price),
            change: round2(change),
            percent_change: round2(percent_change),
            volume,
            volume_formatted: format_volume(volume),
            previous_close: round2(previous_close),
            currency: String::from(DEFAULT_CURRENCY),
            exchange: String::from(DEFAULT_EXCHANGE),
            market_state: String::from(UNKNOWN_MARKET_STATE),
            as_of,
            provenance,
        })
    }

    /// Overrides derived change figures with upstream-reported ones.
    pub fn with_change(
        mut self,
        change: f64,
        percent_change: f64,
    ) -> Result<Self, ValidationError> {
        validate_finite("change", change)?;
        validate_finite("percent_change", percent_change)?;
        self.change = round2(change);
        self.percent_change = round2(percent_change);
        Ok(self)
    }

    pub fn with_listing(
        mut self,
        currency: impl AsRef<str>,
        exchange: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        self.currency = validate_currency_code(currency.as_ref())?;
        self.exchange = exchange.into();
        Ok(self)
    }

    pub fn with_market_state(mut self, market_state: impl Into<String>) -> Self {
        self.market_state = market_state.into();
        self
    }

    /// Fixed fallback quote that needs no validation.
    pub fn minimal(symbol: Symbol, as_of: UtcDateTime) -> Self {
        Self {
            symbol,
            price: 1.0,
            change: 0.0,
            percent_change: 0.0,
            volume: 0,
            volume_formatted: format_volume(0),
            previous_close: 1.0,
            currency: String::from(DEFAULT_CURRENCY),
            exchange: String::from(DEFAULT_EXCHANGE),
            market_state: String::from(UNKNOWN_MARKET_STATE),
            as_of,
            provenance: Provenance::Synthetic,
        }
    }
}

/// OHLCV bar record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Historical bars for one symbol over a lookback period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub symbol: Symbol,
    pub period: Period,
    pub bars: Vec<Bar>,
    pub provenance: Provenance,
}

impl HistoricalSeries {
    pub fn new(symbol: Symbol, period: Period, bars: Vec<Bar>, provenance: Provenance) -> Self {
        Self {
            symbol,
            period,
            bars,
            provenance,
        }
    }
}

/// Company profile snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub symbol: Symbol,
    pub name: String,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub market_cap_formatted: Option<String>,
    pub employees: Option<u64>,
    pub website: Option<String>,
    pub provenance: Provenance,
}

impl Profile {
    pub fn new(symbol: Symbol, name: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            symbol,
            name: name.into(),
            description: None,
            sector: None,
            industry: None,
            market_cap: None,
            market_cap_formatted: None,
            employees: None,
            website: None,
            provenance,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_classification(mut self, sector: Option<String>, industry: Option<String>) -> Self {
        self.sector = sector.filter(|value| !value.trim().is_empty());
        self.industry = industry.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_market_cap(mut self, market_cap: Option<f64>) -> Result<Self, ValidationError> {
        validate_optional_non_negative("market_cap", market_cap)?;
        self.market_cap = market_cap;
        self.market_cap_formatted = market_cap.map(format_market_cap);
        Ok(self)
    }

    pub fn with_employees(mut self, employees: Option<u64>) -> Self {
        self.employees = employees;
        self
    }

    pub fn with_website(mut self, website: Option<String>) -> Self {
        self.website = website.filter(|value| !value.trim().is_empty());
        self
    }
}

/// Any record the cache can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum DataRecord {
    Quote(Quote),
    Historical(HistoricalSeries),
    Profile(Profile),
}

impl DataRecord {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Quote(_) => "quote",
            Self::Historical(_) => "historical",
            Self::Profile(_) => "profile",
        }
    }

    pub const fn provenance(&self) -> Provenance {
        match self {
            Self::Quote(quote) => quote.provenance,
            Self::Historical(series) => series.provenance,
            Self::Profile(profile) => profile.provenance,
        }
    }
}

/// Formats an INR amount in lakh / crore units.
pub fn format_market_cap(value: f64) -> String {
    if value >= 1e12 {
        format!("₹{:.2}L Cr", value / 1e12)
    } else if value >= 1e9 {
        format!("₹{:.0} Cr", value / 1e7)
    } else if value >= 1e7 {
        format!("₹{:.2} Cr", value / 1e7)
    } else if value >= 1e5 {
        format!("₹{:.2}L", value / 1e5)
    } else {
        format!("₹{value:.0}")
    }
}

/// Trading volume in millions (`8.50M`) or thousands (`2.5K`).
pub fn format_volume(volume: u64) -> String {
    let value = volume as f64;
    if value >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        volume.to_string()
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
