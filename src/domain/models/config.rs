use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Execution pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Wave scheduling configuration
    #[serde(default)]
    pub waves: WaveConfig,

    /// TDD red-phase verification
    #[serde(default)]
    pub tdd: TddConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,
}

/// Execution pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Maximum number of remote calls in flight (1-256)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Per-task deadline covering all attempts; `None` disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_timeout_ms: Option<u64>,
}

const fn default_pool_size() -> usize {
    8
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            task_timeout_ms: None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts per task, first call included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff floor in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_backoff_base_ms() -> u64 {
    1_000
}

const fn default_backoff_max_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests allowed per minute across the whole pool
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

const fn default_requests_per_minute() -> u32 {
    50
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// Remote API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    /// Base URL of the Messages API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; usually supplied through `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_timeout_secs() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// How waves are dispatched to the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Each wave waits for the previous one to finish
    Sequential,
    /// Next wave starts once the previous reaches the overlap threshold
    #[default]
    Overlapped,
    /// Next wave starts as soon as any task of the previous one reports
    Aggressive,
    /// Tasks are regrouped into dependency-level batches
    Batched,
}

impl ExecutionStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Overlapped => "overlapped",
            Self::Aggressive => "aggressive",
            Self::Batched => "batched",
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "overlapped" => Ok(Self::Overlapped),
            "aggressive" => Ok(Self::Aggressive),
            "batched" => Ok(Self::Batched),
            other => Err(format!("unknown execution strategy: {other}")),
        }
    }
}

/// What the batch aggregator does when it meets a dependency cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Return a circular dependency error
    #[default]
    Fail,
    /// Put every remaining task on the current level
    Degrade,
}

/// Wave scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WaveConfig {
    /// Maximum tasks placed in one wave
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Whether overlapped execution may start a wave before its predecessor finishes
    #[serde(default = "default_true")]
    pub overlap_enabled: bool,

    /// Completion ratio (0.0-1.0) at which the next wave may start
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Dispatch strategy
    #[serde(default)]
    pub strategy: ExecutionStrategy,

    /// Abort on wave (or batch) failures
    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// Deadline for a whole run; `None` disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_total_ms: Option<u64>,

    /// Regroup waves into true dependency levels (batched strategy)
    #[serde(default)]
    pub batch_mode: bool,

    /// Maximum tasks per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Allow batches to span original wave boundaries
    #[serde(default = "default_true")]
    pub cross_wave_batching: bool,

    /// Behaviour of the batch aggregator on cycles
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

const fn default_max_parallel() -> usize {
    3
}

const fn default_overlap_threshold() -> f64 {
    0.80
}

const fn default_max_batch_size() -> usize {
    10
}

const fn default_true() -> bool {
    true
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            overlap_enabled: true,
            overlap_threshold: default_overlap_threshold(),
            strategy: ExecutionStrategy::default(),
            fail_fast: true,
            timeout_total_ms: None,
            batch_mode: false,
            max_batch_size: default_max_batch_size(),
            cross_wave_batching: true,
            cycle_policy: CyclePolicy::default(),
        }
    }
}

impl WaveConfig {
    /// Threshold the gate between two waves opens at.
    pub fn effective_threshold(&self) -> f64 {
        match self.strategy {
            ExecutionStrategy::Aggressive => 0.0,
            _ if !self.overlap_enabled => 1.0,
            _ => self.overlap_threshold,
        }
    }

    /// Batch aggregator settings derived from this configuration.
    ///
    /// The batched strategy always aggregates; `batch_mode` only matters to
    /// callers that build batches themselves.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            enabled: self.batch_mode || self.strategy == ExecutionStrategy::Batched,
            max_batch_size: self.max_batch_size,
            cross_wave_batching: self.cross_wave_batching,
            cycle_policy: self.cycle_policy,
        }
    }
}

/// Batch aggregator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Regroup tasks; when false every wave becomes one batch
    pub enabled: bool,
    /// Maximum tasks per batch
    pub max_batch_size: usize,
    /// Allow batches to span original wave boundaries
    pub cross_wave_batching: bool,
    /// Behaviour on dependency cycles
    pub cycle_policy: CyclePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: default_max_batch_size(),
            cross_wave_batching: true,
            cycle_policy: CyclePolicy::Fail,
        }
    }
}

/// TDD red-phase verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TddConfig {
    /// Verify freshly written tests fail and unlock their dependents early
    #[serde(default)]
    pub early_test_verification: bool,

    /// Project root used for framework detection and test paths
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// How many times to look for the test file
    #[serde(default = "default_file_poll_retries")]
    pub file_poll_retries: u32,

    /// Delay between file lookups in milliseconds
    #[serde(default = "default_file_poll_delay_ms")]
    pub file_poll_delay_ms: u64,

    /// Test command timeout in seconds
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// Abort the run when a new test passes before implementation
    #[serde(default, alias = "block_on_qg_test_003")]
    pub block_on_passing_test: bool,

    /// Continue with normal wave flow when verification errors
    #[serde(default = "default_true")]
    pub fallback_to_normal_flow: bool,

    /// Early unlocks allowed per wave before the breaker trips
    #[serde(default = "default_max_early_unlocks_per_wave")]
    pub max_early_unlocks_per_wave: u32,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

const fn default_file_poll_retries() -> u32 {
    5
}

const fn default_file_poll_delay_ms() -> u64 {
    200
}

const fn default_test_timeout_secs() -> u64 {
    60
}

const fn default_max_early_unlocks_per_wave() -> u32 {
    3
}

impl Default for TddConfig {
    fn default() -> Self {
        Self {
            early_test_verification: false,
            project_root: default_project_root(),
            file_poll_retries: default_file_poll_retries(),
            file_poll_delay_ms: default_file_poll_delay_ms(),
            test_timeout_secs: default_test_timeout_secs(),
            block_on_passing_test: false,
            fallback_to_normal_flow: true,
            max_early_unlocks_per_wave: default_max_early_unlocks_per_wave(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for stdout
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Enable stdout logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log file rotation
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}
