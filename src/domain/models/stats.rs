use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::tier::ModelTier;

/// Usage for one model tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierUsage {
    pub requests: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens_total: u64,
    pub cost: f64,
}

/// Point-in-time view of a pool's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    /// Successful requests
    pub total_requests: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub total_tokens: u64,
    /// Cost in USD across all tiers
    pub total_cost: f64,
    /// Summed duration of successful requests
    pub total_duration_ms: u64,
    /// Mean duration of successful requests
    pub avg_duration_ms: f64,
    pub pool_size: usize,
    /// Results currently held in the pool's cache
    pub cached_results: usize,
    /// Only tiers that saw at least one request
    pub by_tier: BTreeMap<ModelTier, TierUsage>,
}
