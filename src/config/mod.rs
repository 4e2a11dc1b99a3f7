//! Configuration module for Crawl-Sentinel
//!
//! This module handles loading, parsing, and validating TOML configuration files, resolving the
//! crawl target, and deriving the tightened parameters of the retry attempt.
//!
//! # Example
//!
//! ```no_run
//! use crawl_sentinel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sentinel.toml")).unwrap();
//! println!("Crawl tool: {}", config.tool.command);
//! ```

mod parser;
mod run;
mod target;
mod types;
mod validation;

// Re-export types
pub use run::{
    RetryOverrides, RunConfig, SitemapMode, MAX_TIMEOUT_SECS, RETRY_CONCURRENCY, RETRY_MAX_DEPTH,
    RETRY_MAX_LIMIT, RETRY_MIN_DELAY_MS,
};
pub use target::{derive_slug, validate_slug, Target};
pub use types::{
    ApiConfig, Config, FallbackConfig, OutputConfig, RetryConfig, TargetConfig, ToolConfig,
};

pub use validation::validate_run_config;

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
