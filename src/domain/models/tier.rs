//! Model tiers and per-tier pricing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pricing per million tokens for a tier (USD).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierRates {
    /// Cost per million input tokens
    pub input: f64,
    /// Cost per million output tokens
    pub output: f64,
}

/// Coarse capability/cost class a model id maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Opus,
    Sonnet,
    Haiku,
}

impl ModelTier {
    /// All tiers, most capable first.
    pub const ALL: [Self; 3] = [Self::Opus, Self::Sonnet, Self::Haiku];

    /// Map a model identifier onto its tier.
    ///
    /// Matches case-insensitive substrings; unknown identifiers fall back to
    /// the middle tier.
    pub fn from_model_id(model_id: &str) -> Self {
        let lower = model_id.to_lowercase();
        if lower.contains("opus") {
            Self::Opus
        } else if lower.contains("sonnet") {
            Self::Sonnet
        } else if lower.contains("haiku") {
            Self::Haiku
        } else {
            Self::Sonnet
        }
    }

    /// Model identifier used when a task names the tier only.
    pub const fn default_model_id(self) -> &'static str {
        match self {
            Self::Opus => "claude-opus-4-5-20251101",
            Self::Sonnet => "claude-sonnet-4-5-20250929",
            Self::Haiku => "claude-3-5-haiku-20241022",
        }
    }

    pub const fn rates(self) -> TierRates {
        match self {
            Self::Opus => TierRates {
                input: 15.00,
                output: 75.00,
            },
            Self::Sonnet => TierRates {
                input: 3.00,
                output: 15.00,
            },
            Self::Haiku => TierRates {
                input: 0.25,
                output: 1.25,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Sonnet => "sonnet",
            Self::Haiku => "haiku",
        }
    }

    /// Cost in USD for the given token usage.
    pub fn cost(self, tokens_in: u64, tokens_out: u64) -> f64 {
        let rates = self.rates();
        (tokens_in as f64 * rates.input + tokens_out as f64 * rates.output) / 1_000_000.0
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
