//! Deterministic last-resort data.
//!
//! Values are drawn from RNGs seeded by the identifier plus a time bucket,
//! so repeated calls within the same hour (quotes) or day (series) agree
//! without any shared state.

use std::f64::consts::TAU;

use crate::domain::round2;
use crate::{
    Bar, HistoricalSeries, Period, Profile, Provenance, Quote, Symbol, UtcDateTime,
    ValidationError,
};

const MAX_DAILY_MOVE: f64 = 0.05;
const PRICE_BAND: f64 = 0.20;
const SECONDS_PER_DAY: i64 = 86_400;
const UNKNOWN_SECTORS: [&str; 5] = [
    "Technology",
    "Finance",
    "Healthcare",
    "Energy",
    "Consumer Goods",
];

/// Reference values a synthetic record is generated around.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub name: String,
    pub base_price: f64,
    /// Daily standard deviation as a fraction of price.
    pub volatility: f64,
    pub volume_range: (u64, u64),
    pub market_cap: f64,
    pub sector: String,
    pub industry: String,
    pub description: String,
}

struct Listing {
    symbol: &'static str,
    name: &'static str,
    base_price: f64,
    volatility: f64,
    volume_range: (u64, u64),
    market_cap: f64,
    sector: &'static str,
    industry: &'static str,
    description: &'static str,
}

static LISTINGS: [Listing; 10] = [
    Listing {
        symbol: "RELIANCE",
        name: "Reliance Industries Limited",
        base_price: 2950.0,
        volatility: 0.02,
        volume_range: (5_000_000, 15_000_000),
        market_cap: 19_500_000_000_000.0,
        sector: "Oil & Gas",
        industry: "Refineries",
        description: "India's largest private sector company with interests in petrochemicals, oil & gas, telecom and retail.",
    },
    Listing {
        symbol: "TCS",
        name: "Tata Consultancy Services Limited",
        base_price: 4200.0,
        volatility: 0.015,
        volume_range: (2_000_000, 8_000_000),
        market_cap: 15_400_000_000_000.0,
        sector: "Information Technology",
        industry: "IT Services",
        description: "Leading global IT services, consulting and business solutions organization.",
    },
    Listing {
        symbol: "HDFCBANK",
        name: "HDFC Bank Limited",
        base_price: 1750.0,
        volatility: 0.018,
        volume_range: (3_000_000, 12_000_000),
        market_cap: 13_200_000_000_000.0,
        sector: "Financial Services",
        industry: "Private Sector Bank",
        description: "India's largest private sector bank offering a wide range of banking and financial services.",
    },
    Listing {
        symbol: "INFY",
        name: "Infosys Limited",
        base_price: 1850.0,
        volatility: 0.02,
        volume_range: (4_000_000, 10_000_000),
        market_cap: 7_800_000_000_000.0,
        sector: "Information Technology",
        industry: "IT Services",
        description: "Global leader in next-generation digital services and consulting.",
    },
    Listing {
        symbol: "ICICIBANK",
        name: "ICICI Bank Limited",
        base_price: 1250.0,
        volatility: 0.022,
        volume_range: (8_000_000, 20_000_000),
        market_cap: 8_700_000_000_000.0,
        sector: "Financial Services",
        industry: "Private Sector Bank",
        description: "India's second-largest private sector bank providing comprehensive financial services.",
    },
    Listing {
        symbol: "BHARTIARTL",
        name: "Bharti Airtel Limited",
        base_price: 1650.0,
        volatility: 0.025,
        volume_range: (6_000_000, 18_000_000),
        market_cap: 9_200_000_000_000.0,
        sector: "Telecommunication",
        industry: "Telecom Services",
        description: "Leading telecommunications company providing mobile, broadband and digital services.",
    },
    Listing {
        symbol: "ITC",
        name: "ITC Limited",
        base_price: 485.0,
        volatility: 0.015,
        volume_range: (10_000_000, 25_000_000),
        market_cap: 6_000_000_000_000.0,
        sector: "FMCG",
        industry: "Diversified FMCG",
        description: "Leading Indian conglomerate with interests in FMCG, hotels, paperboards and agri-business.",
    },
    Listing {
        symbol: "SBIN",
        name: "State Bank of India",
        base_price: 850.0,
        volatility: 0.025,
        volume_range: (15_000_000, 35_000_000),
        market_cap: 7_600_000_000_000.0,
        sector: "Financial Services",
        industry: "Public Sector Bank",
        description: "India's largest public sector bank providing comprehensive banking services.",
    },
    Listing {
        symbol: "LT",
        name: "Larsen & Toubro Limited",
        base_price: 3650.0,
        volatility: 0.02,
        volume_range: (1_500_000, 5_000_000),
        market_cap: 5_100_000_000_000.0,
        sector: "Construction",
        industry: "Engineering & Construction",
        description: "Leading Indian multinational engaged in EPC projects, hi-tech manufacturing and services.",
    },
    Listing {
        symbol: "HCLTECH",
        name: "HCL Technologies Limited",
        base_price: 1580.0,
        volatility: 0.022,
        volume_range: (2_500_000, 7_000_000),
        market_cap: 4_300_000_000_000.0,
        sector: "Information Technology",
        industry: "IT Services",
        description: "Leading global technology company providing IT services and solutions.",
    },
];

/// FNV-1a over the seed parts; stable across processes and releases.
fn seed(parts: &[&[u8]]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = OFFSET;
    for part in parts {
        for byte in part.iter().chain(std::iter::once(&0xff)) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}

/// Standard normal sample scaled by `sigma` (Box-Muller).
fn gauss(rng: &mut fastrand::Rng, sigma: f64) -> f64 {
    let u1 = rng.f64().max(f64::MIN_POSITIVE);
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos() * sigma
}

fn uniform(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

fn clamp_move(change: f64) -> f64 {
    change.clamp(-MAX_DAILY_MOVE, MAX_DAILY_MOVE)
}

/// Always-succeeding generator of plausible NSE market data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    pub const fn new() -> Self {
        Self
    }

    /// Table baseline, or one derived from an RNG seeded by the symbol.
    pub fn baseline(&self, symbol: &Symbol) -> Baseline {
        if let Some(listing) = LISTINGS
            .iter()
            .find(|listing| listing.symbol == symbol.as_str())
        {
            return Baseline {
                name: listing.name.to_owned(),
                base_price: listing.base_price,
                volatility: listing.volatility,
                volume_range: listing.volume_range,
                market_cap: listing.market_cap,
                sector: listing.sector.to_owned(),
                industry: listing.industry.to_owned(),
                description: listing.description.to_owned(),
            };
        }

        let mut rng = fastrand::Rng::with_seed(seed(&[b"baseline", symbol.as_str().as_bytes()]));
        let sector = UNKNOWN_SECTORS[rng.usize(..UNKNOWN_SECTORS.len())];
        Baseline {
            name: format!("{symbol} Limited"),
            base_price: round2(uniform(&mut rng, 100.0, 5_000.0)),
            volatility: uniform(&mut rng, 0.015, 0.03),
            volume_range: (1_000_000, 10_000_000),
            market_cap: uniform(&mut rng, 1e11, 1e13).round(),
            sector: sector.to_owned(),
            industry: String::from("Diversified"),
            description: format!(
                "{symbol} is a leading company in its sector with strong market presence."
            ),
        }
    }

    pub fn quote(&self, symbol: &Symbol) -> Quote {
        self.quote_at(symbol, UtcDateTime::now())
    }

    /// Quote for the UTC hour containing `now`.
    pub fn quote_at(&self, symbol: &Symbol, now: UtcDateTime) -> Quote {
        self.try_quote(symbol, now).unwrap_or_else(|error| {
            tracing::warn!(symbol = %symbol, error = %error, "synthetic quote degraded to default");
            Quote::minimal(symbol.clone(), now)
        })
    }

    fn try_quote(&self, symbol: &Symbol, now: UtcDateTime) -> Result<Quote, ValidationError> {
        let baseline = self.baseline(symbol);
        let mut rng = fastrand::Rng::with_seed(seed(&[
            b"quote",
            symbol.as_str().as_bytes(),
            &now.hour_bucket().to_le_bytes(),
        ]));

        let change = clamp_move(gauss(&mut rng, baseline.volatility));
        let base = baseline.base_price;
        let price =
            (base * (1.0 + change)).clamp(base * (1.0 - PRICE_BAND), base * (1.0 + PRICE_BAND));
        let (low, high) = baseline.volume_range;
        let volume = rng.u64(low..=high.max(low));

        Ok(
            Quote::new(symbol.clone(), price, base, volume, now, Provenance::Synthetic)?
                .with_market_state("REGULAR"),
        )
    }

    pub fn historical(&self, symbol: &Symbol, period: Period) -> HistoricalSeries {
        self.historical_at(symbol, period, UtcDateTime::now())
    }

    /// Daily series ending the day before `now`, stable within that UTC day.
    pub fn historical_at(
        &self,
        symbol: &Symbol,
        period: Period,
        now: UtcDateTime,
    ) -> HistoricalSeries {
        let bars = self.try_bars(symbol, period, now).unwrap_or_else(|error| {
            tracing::warn!(
                symbol = %symbol,
                period = %period,
                error = %error,
                "synthetic series degraded to empty"
            );
            Vec::new()
        });
        HistoricalSeries::new(symbol.clone(), period, bars, Provenance::Synthetic)
    }

    fn try_bars(
        &self,
        symbol: &Symbol,
        period: Period,
        now: UtcDateTime,
    ) -> Result<Vec<Bar>, ValidationError> {
        let baseline = self.baseline(symbol);
        let today = now.day_bucket();
        let mut rng = fastrand::Rng::with_seed(seed(&[
            b"historical",
            symbol.as_str().as_bytes(),
            period.as_str().as_bytes(),
            &today.to_le_bytes(),
        ]));

        let days = period.synthetic_days();
        let first_day = today - i64::try_from(days).unwrap_or(i64::MAX);
        let intraday = baseline.volatility * 0.5;
        let mut price = baseline.base_price;
        let mut bars = Vec::with_capacity(days);

        for offset in 0..days {
            let day = first_day + i64::try_from(offset).unwrap_or(i64::MAX);
            let ts = UtcDateTime::from_unix_timestamp(day.saturating_mul(SECONDS_PER_DAY))?;

            let change = clamp_move(gauss(&mut rng, baseline.volatility));
            let open = price;
            let close = open * (1.0 + change);
            let high = open.max(close) * (1.0 + gauss(&mut rng, intraday).abs());
            let low = open.min(close) * (1.0 - gauss(&mut rng, intraday).abs()).max(0.0);

            let base_volume = rng.u64(1_000_000..=5_000_000) as f64;
            let volume = (base_volume * (1.0 + change.abs() * 10.0)) as u64;

            bars.push(Bar::new(
                ts,
                round2(open),
                round2(high),
                round2(low),
                round2(close),
                volume,
            )?);
            price = close;
        }

        Ok(bars)
    }

    pub fn profile(&self, symbol: &Symbol) -> Profile {
        self.try_profile(symbol).unwrap_or_else(|error| {
            tracing::warn!(
                symbol = %symbol,
                error = %error,
                "synthetic profile degraded to name only"
            );
            Profile::new(symbol.clone(), format!("{symbol} Limited"), Provenance::Synthetic)
        })
    }

    fn try_profile(&self, symbol: &Symbol) -> Result<Profile, ValidationError> {
        let baseline = self.baseline(symbol);
        let mut rng = fastrand::Rng::with_seed(seed(&[b"profile", symbol.as_str().as_bytes()]));
        let website = format!(
            "https://www.{}.com",
            symbol.as_str().to_ascii_lowercase().replace('&', "")
        );

        Ok(Profile::new(symbol.clone(), baseline.name, Provenance::Synthetic)
            .with_description(Some(baseline.description))
            .with_classification(Some(baseline.sector), Some(baseline.industry))
            .with_market_cap(Some(baseline.market_cap))?
            .with_employees(Some(rng.u64(50_000..=500_000)))
            .with_website(Some(website)))
    }
}
