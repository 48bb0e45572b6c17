//! Services layer: the execution pool, scheduling and verification.

pub mod agent_pool;
pub mod batch_aggregator;
pub mod circuit_breaker;
pub mod pricing;
pub mod tdd_verifier;
pub mod wave_scheduler;

pub use agent_pool::{AgentPool, PoolOptions, POOL_CLOSED};
pub use batch_aggregator::{AggregationStats, BatchAggregator};
pub use circuit_breaker::{CircuitState, EarlyUnlockBreaker};
pub use pricing::{estimate_cost, PoolStatistics};
pub use tdd_verifier::{
    locate_test_file, TddVerifier, TestFramework, VerificationResult, VerificationStatus,
};
pub use wave_scheduler::{build_waves, render_plan, TaskCallback, WaveCallback, WaveScheduler};
