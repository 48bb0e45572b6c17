//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output
//! - Rolling JSON log files
//! - Secret scrubbing for echoed remote payloads

pub mod logger;
pub mod secret_scrubbing;

pub use crate::domain::models::{LogConfig, LogFormat, RotationPolicy};
pub use logger::{parse_log_level, LoggerImpl, LOG_FILE_NAME};
pub use secret_scrubbing::{scrub_secrets, SecretScrubber};
