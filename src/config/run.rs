//! Crawl parameters and the derived parameters of the retry attempt

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page limit ceiling applied to the retry attempt
pub const RETRY_MAX_LIMIT: u32 = 8;

/// Depth ceiling applied to the retry attempt
pub const RETRY_MAX_DEPTH: u32 = 2;

/// Concurrency used by the retry attempt
pub const RETRY_CONCURRENCY: u32 = 1;

/// Minimum delay between requests on the retry attempt (milliseconds)
pub const RETRY_MIN_DELAY_MS: u64 = 1000;

/// Longest crawl timeout accepted (seconds): one week
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// How the crawl tool treats the site's sitemap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapMode {
    #[default]
    Include,
    Skip,
    Only,
}

impl SitemapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Skip => "skip",
            Self::Only => "only",
        }
    }
}

impl fmt::Display for SitemapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crawl parameters for one attempt
///
/// The configured value is never mutated; the retry attempt works on a copy produced by
/// [`RunConfig::for_retry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Maximum number of pages to crawl
    pub limit: u32,

    /// Maximum link depth from the target URL
    pub max_depth: u32,

    /// Delay between requests (milliseconds)
    pub delay_ms: u64,

    /// Maximum number of concurrent requests
    pub max_concurrency: u32,

    /// How often the tool polls the remote job (seconds)
    #[serde(rename = "poll-interval")]
    pub poll_interval_secs: u64,

    /// Hard wall-clock limit (seconds); `None` waits for the tool indefinitely
    #[serde(rename = "timeout")]
    pub timeout_secs: Option<u64>,

    pub sitemap: SitemapMode,

    pub include_paths: Vec<String>,

    pub exclude_paths: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            limit: 25,
            max_depth: 3,
            delay_ms: 250,
            max_concurrency: 2,
            poll_interval_secs: 5,
            timeout_secs: None,
            sitemap: SitemapMode::Include,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

/// Parameter overrides applied to the retry attempt, recorded on the attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOverrides {
    pub limit: u32,
    pub max_depth: u32,
    pub max_concurrency: u32,
    pub delay_ms: u64,
    pub sitemap: SitemapMode,
}

impl RunConfig {
    /// Derives the tightened parameters for the second attempt.
    ///
    /// `sitemap` replaces the default `skip` mode when given; the other overrides are fixed.
    pub fn for_retry(&self, sitemap: Option<SitemapMode>) -> (RunConfig, RetryOverrides) {
        let overrides = RetryOverrides {
            limit: self.limit.min(RETRY_MAX_LIMIT),
            max_depth: self.max_depth.min(RETRY_MAX_DEPTH),
            max_concurrency: RETRY_CONCURRENCY,
            delay_ms: self.delay_ms.max(RETRY_MIN_DELAY_MS),
            sitemap: sitemap.unwrap_or(SitemapMode::Skip),
        };

        let derived = RunConfig {
            limit: overrides.limit,
            max_depth: overrides.max_depth,
            max_concurrency: overrides.max_concurrency,
            delay_ms: overrides.delay_ms,
            sitemap: overrides.sitemap,
            ..self.clone()
        };

        (derived, overrides)
    }
}
