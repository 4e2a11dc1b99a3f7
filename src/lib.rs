//! Crawl-Sentinel: a guarded crawl job orchestrator
//!
//! This crate drives an external crawl tool as a subprocess, enforces hard time limits on it,
//! retries stalled remote jobs with tighter parameters, scans the final result against a listing
//! content policy and records every run in a single summary artifact.

pub mod config;
pub mod orchestrator;
pub mod output;
pub mod policy;
pub mod process;
pub mod remote;
pub mod retry;
pub mod state;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Crawl-Sentinel operations
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn crawl tool '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Crawl output {path} is not valid JSON: {source}")]
    CrawlOutput {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),
}

/// Result type alias for Crawl-Sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, RunConfig};
pub use orchestrator::{Coordinator, RunOutcome};
pub use state::{Attempt, AttemptOutcome, FailureKind, RunResult};
