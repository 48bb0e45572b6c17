pub mod config;
pub mod manifest;
pub mod report;
pub mod result;
pub mod stats;
pub mod task;
pub mod tier;
pub mod wave;

pub use config::{
    ApiConfig, BatchConfig, Config, CyclePolicy, ExecutionStrategy, LogConfig, LogFormat,
    PoolConfig, RateLimitConfig, RetryConfig, RotationPolicy, TddConfig, WaveConfig,
};
pub use manifest::TaskManifest;
pub use report::ExecutionReport;
pub use result::AgentResult;
pub use stats::{PoolStatsSnapshot, TierUsage};
pub use task::{AgentTask, TaskMetadata, DEFAULT_PRIORITY, DEFAULT_ROLE_GROUP};
pub use tier::{ModelTier, TierRates};
pub use wave::{BatchGroup, Wave};
