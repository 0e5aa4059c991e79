use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical upstream provider identifiers.
///
/// Declaration order is the default priority order of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Twelvedata,
    Finnhub,
}

impl ProviderId {
    pub const ALL: [Self; 2] = [Self::Twelvedata, Self::Finnhub];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twelvedata => "twelvedata",
            Self::Finnhub => "finnhub",
        }
    }

    /// Default priority rank; lower ranks are tried first.
    pub const fn default_rank(self) -> u8 {
        match self {
            Self::Twelvedata => 0,
            Self::Finnhub => 1,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "twelvedata" | "twelve_data" => Ok(Self::Twelvedata),
            "finnhub" => Ok(Self::Finnhub),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
