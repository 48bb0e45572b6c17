//! Tier-based cost estimation and usage accounting.
//!
//! Costs are derived from the coarse tier a model id maps to, so new model
//! versions are priced without a table update.

use std::collections::BTreeMap;

use crate::domain::models::{AgentResult, ModelTier, PoolStatsSnapshot, TierUsage};

/// Estimate cost in USD for a model id and token counts.
pub fn estimate_cost(model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    ModelTier::from_model_id(model).cost(tokens_in, tokens_out)
}

/// Process-lifetime usage counters for one pool
///
/// Only successful results are counted.
#[derive(Debug, Clone, Default)]
pub struct PoolStatistics {
    requests: u64,
    tokens_in: u64,
    tokens_out: u64,
    duration_ms: u64,
    by_tier: BTreeMap<ModelTier, TierUsage>,
}

impl PoolStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful result to the counters; failures are ignored.
    pub fn record(&mut self, result: &AgentResult) {
        if !result.success {
            return;
        }
        self.requests += 1;
        self.tokens_in += result.tokens_in;
        self.tokens_out += result.tokens_out;
        self.duration_ms += result.duration_ms;

        let tier = self.by_tier.entry(result.model_tier).or_default();
        tier.requests += 1;
        tier.tokens_in += result.tokens_in;
        tier.tokens_out += result.tokens_out;
        tier.tokens_total += result.total_tokens();
        tier.cost += result.cost;
    }

    pub const fn requests(&self) -> u64 {
        self.requests
    }

    pub fn total_cost(&self) -> f64 {
        self.by_tier.values().map(|t| t.cost).sum()
    }

    pub fn snapshot(&self, pool_size: usize, cached_results: usize) -> PoolStatsSnapshot {
        let avg_duration_ms = if self.requests == 0 {
            0.0
        } else {
            self.duration_ms as f64 / self.requests as f64
        };

        PoolStatsSnapshot {
            total_requests: self.requests,
            total_tokens_in: self.tokens_in,
            total_tokens_out: self.tokens_out,
            total_tokens: self.tokens_in + self.tokens_out,
            total_cost: self.total_cost(),
            total_duration_ms: self.duration_ms,
            avg_duration_ms,
            pool_size,
            cached_results,
            by_tier: self.by_tier.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(model: &str, tokens_in: u64, tokens_out: u64, duration_ms: u64) -> AgentResult {
        AgentResult {
            success: true,
            error: None,
            tokens_in,
            tokens_out,
            cost: estimate_cost(model, tokens_in, tokens_out),
            ..AgentResult::failure("t", model, "", duration_ms)
        }
    }

    #[test]
    fn test_estimate_cost() {
        let cost = estimate_cost("claude-sonnet-4-5-20250929", 1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < 1e-9);
        let cost = estimate_cost("some-unknown-model", 1_000_000, 0);
        assert!((cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_accumulate_per_tier() {
        let mut stats = PoolStatistics::new();
        stats.record(&success("claude-opus-4-5-20251101", 1_000, 500, 100));
        stats.record(&success("claude-3-5-haiku-20241022", 2_000, 1_000, 300));
        stats.record(&AgentResult::failure("x", "claude-opus-4-5-20251101", "err", 50));

        let snapshot = stats.snapshot(8, 2);
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.total_tokens_in, 3_000);
        assert_eq!(snapshot.total_tokens, 4_500);
        assert_eq!(snapshot.total_duration_ms, 400);
        assert!((snapshot.avg_duration_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.pool_size, 8);
        assert_eq!(snapshot.cached_results, 2);
        assert_eq!(snapshot.by_tier.len(), 2);
        assert!(!snapshot.by_tier.contains_key(&ModelTier::Sonnet));

        let opus = &snapshot.by_tier[&ModelTier::Opus];
        assert_eq!(opus.requests, 1);
        assert_eq!(opus.tokens_total, 1_500);
        assert_eq!(snapshot.by_tier[&ModelTier::Haiku].tokens_total, 3_000);
        let expected = (1_000.0 * 15.0 + 500.0 * 75.0) / 1_000_000.0;
        assert!((opus.cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = PoolStatistics::new().snapshot(4, 0);
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_duration_ms, 0);
        assert!(snapshot.avg_duration_ms.abs() < f64::EPSILON);
        assert!(snapshot.by_tier.is_empty());
    }
}
