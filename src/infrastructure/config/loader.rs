use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::infrastructure::logging::parse_log_level;

/// Directory holding project configuration, relative to the project root
pub const CONFIG_DIR: &str = ".specify";

/// Environment variable prefix; nested keys use `__`
pub const ENV_PREFIX: &str = "SPECIFY_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid pool_size: {0}. Must be between 1 and 256")]
    InvalidPoolSize(usize),

    #[error("Invalid requests_per_minute: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: backoff_base_ms ({0}) must not exceed backoff_max_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid max_parallel: {0}. Must be at least 1")]
    InvalidMaxParallel(usize),

    #[error("Invalid overlap_threshold: {0}. Must be between 0.0 and 1.0")]
    InvalidOverlapThreshold(f64),

    #[error("Invalid max_batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .specify/orchestrate.yaml (project config)
    /// 3. .specify/local.yaml (local overrides, optional)
    /// 4. Environment variables (SPECIFY_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration for the project rooted at `root`
    pub fn load_from(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Self::figment(&[dir.join("orchestrate.yaml"), dir.join("local.yaml")])
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Self::figment(&[path.to_path_buf()])
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(files: &[PathBuf]) -> Figment {
        files.iter().fold(
            Figment::new().merge(Serialized::defaults(Config::default())),
            |figment, file| figment.merge(Yaml::file(file)),
        )
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.pool.pool_size == 0 || config.pool.pool_size > 256 {
            return Err(ConfigError::InvalidPoolSize(config.pool.pool_size));
        }
        if config.pool.task_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "pool.task_timeout_ms must be positive when set".to_string(),
            ));
        }

        if config.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_minute,
            ));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }
        if config.retry.backoff_base_ms > config.retry.backoff_max_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.backoff_base_ms,
                config.retry.backoff_max_ms,
            ));
        }

        if config.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        let waves = &config.waves;
        if waves.max_parallel == 0 {
            return Err(ConfigError::InvalidMaxParallel(waves.max_parallel));
        }
        if !(0.0..=1.0).contains(&waves.overlap_threshold) {
            return Err(ConfigError::InvalidOverlapThreshold(waves.overlap_threshold));
        }
        if waves.max_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(waves.max_batch_size));
        }
        if waves.timeout_total_ms == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "waves.timeout_total_ms must be positive when set".to_string(),
            ));
        }

        if config.tdd.test_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "tdd.test_timeout_secs must be positive".to_string(),
            ));
        }

        if parse_log_level(&config.logging.level).is_err() {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
