//! Domain layer for the orchestrator
//!
//! This module contains core scheduling models, errors and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ApiError, ManifestError, SchedulerError, SchedulerResult};
