use crate::config::run::RunConfig;
use crate::config::run::SitemapMode;
use serde::Deserialize;

/// Main configuration structure for Crawl-Sentinel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,

    /// Crawl parameters handed to the external tool on the first attempt
    #[serde(default)]
    pub crawl: RunConfig,

    pub tool: ToolConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl target; either field may be supplied on the command line instead
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub slug: Option<String>,
}

/// External crawl tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Program to execute (looked up on PATH)
    pub command: String,

    /// Arguments placed before the target URL
    #[serde(default)]
    pub args: Vec<String>,

    /// File the tool writes its structured result to, relative to the slug artifact directory
    #[serde(rename = "output-file", default = "default_output_file")]
    pub output_file: String,

    /// Whether the tool's output is echoed to our stdout while it runs
    #[serde(rename = "echo-output", default = "default_true")]
    pub echo_output: bool,
}

/// Remote job API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the bearer credential
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Reads the credential from the configured environment variable.
    ///
    /// An unset or blank variable yields `None`; callers treat that as a normal failure mode.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Second-attempt behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit sitemap mode for the retry; `skip` when absent
    #[serde(default)]
    pub sitemap: Option<SitemapMode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sitemap: None,
        }
    }
}

/// Hand-off to the whitelist scrape collaborator
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory; each slug gets its own subdirectory
    #[serde(rename = "artifact-root", default = "default_artifact_root")]
    pub artifact_root: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_file() -> String {
    "crawl.json".to_string()
}

fn default_base_url() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_api_key_env() -> String {
    "FIRECRAWL_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_artifact_root() -> String {
    "artifacts".to_string()
}
