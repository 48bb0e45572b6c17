//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports:
//! - Claude Messages API client with retry and rate limiting
//! - Configuration management
//! - Logging infrastructure
//! - Test command processes
//! - Markdown status file updates
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod claude;
pub mod config;
pub mod logging;
pub mod process;
pub mod status_file;
