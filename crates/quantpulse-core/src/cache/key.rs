use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Period, Symbol, ValidationError};

/// Record category. Each category owns its own cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Quote,
    Historical,
    Profile,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Quote, Self::Historical, Self::Profile];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Profile => "profile",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Quote => 0,
            Self::Historical => 1,
            Self::Profile => 2,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or(ValidationError::InvalidCategory { value: normalized })
    }
}

/// Composite cache key rendered as `category:identifier[:variant]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    category: Category,
    identifier: String,
    variant: Option<String>,
}

impl CacheKey {
    pub fn new(category: Category, identifier: impl Into<String>) -> Self {
        Self {
            category,
            identifier: identifier.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn quote(symbol: &Symbol) -> Self {
        Self::new(Category::Quote, symbol.as_str())
    }

    pub fn historical(symbol: &Symbol, period: Period) -> Self {
        Self::new(Category::Historical, symbol.as_str()).with_variant(period.as_str())
    }

    pub fn profile(symbol: &Symbol) -> Self {
        Self::new(Category::Profile, symbol.as_str())
    }

    pub const fn category(&self) -> Category {
        self.category
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.identifier)?;
        if let Some(variant) = &self.variant {
            write!(f, ":{variant}")?;
        }
        Ok(())
    }
}

/// Freshness window of one category.
///
/// Entries are fresh up to `ttl`, stale (servable, refreshed in the
/// background) up to `max_age`, and gone afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_age: Duration,
}

impl CachePolicy {
    /// Policy with `max_age = 2 * ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_age: ttl.saturating_mul(2),
        }
    }

    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn validate(&self, category: Category) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl {
                category: category.as_str(),
            });
        }
        if self.max_age < self.ttl {
            return Err(ConfigError::MaxAgeBelowTtl {
                category: category.as_str(),
                ttl_secs: self.ttl.as_secs(),
                max_age_secs: self.max_age.as_secs(),
            });
        }
        Ok(())
    }
}

/// Per-category cache policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicies {
    pub quote: CachePolicy,
    pub historical: CachePolicy,
    pub profile: CachePolicy,
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self {
            quote: CachePolicy::new(Duration::from_secs(60)),
            historical: CachePolicy::new(Duration::from_secs(300)),
            profile: CachePolicy::new(Duration::from_secs(86_400)),
        }
    }
}

impl CachePolicies {
    pub const fn for_category(&self, category: Category) -> CachePolicy {
        match category {
            Category::Quote => self.quote,
            Category::Historical => self.historical,
            Category::Profile => self.profile,
        }
    }

    pub fn set(&mut self, category: Category, policy: CachePolicy) {
        match category {
            Category::Quote => self.quote = policy,
            Category::Historical => self.historical = policy,
            Category::Profile => self.profile = policy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Category::ALL
            .into_iter()
            .try_for_each(|category| self.for_category(category).validate(category))
    }
}
