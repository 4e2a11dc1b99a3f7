//! HTTP client for the remote crawl job API
//!
//! Every call resolves to an [`ApiResponse`]; transport errors, non-2xx statuses and a missing
//! credential are all failure results rather than errors.

use crate::config::ApiConfig;
use crate::SentinelError;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Outcome of one job API call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub ok: bool,

    /// HTTP status, absent when no request was made or the transport failed
    pub status_code: Option<u16>,

    /// Parsed JSON body, the raw text as a string, or a descriptive error object
    pub body: Value,
}

impl ApiResponse {
    /// A failure result that never reached the server
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: None,
            body: json!({ "success": false, "error": message.into() }),
        }
    }
}

/// Calls against a remote crawl job
#[allow(async_fn_in_trait)]
pub trait JobApi {
    /// `GET /v2/crawl/{jobId}`
    async fn status(&self, job_id: &str) -> ApiResponse;

    /// `GET /v2/crawl/{jobId}/errors`
    async fn errors(&self, job_id: &str) -> ApiResponse;

    /// `DELETE /v2/crawl/{jobId}`
    async fn cancel(&self, job_id: &str) -> ApiResponse;
}

/// Builds the HTTP client used for job API calls
pub fn build_http_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!("crawl-sentinel/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Job API client authenticated with a bearer credential
pub struct CrawlApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    credential_name: String,
}

impl CrawlApiClient {
    /// Creates a client from configuration, reading the credential from the environment
    pub fn new(config: &ApiConfig) -> Result<Self, SentinelError> {
        let mut client = Self::with_api_key(
            &config.base_url,
            config.api_key(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.credential_name = config.api_key_env.clone();
        Ok(client)
    }

    /// Creates a client with an explicit credential
    pub fn with_api_key(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, SentinelError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: build_http_client(request_timeout)?,
            base_url,
            api_key,
            credential_name: "API key".to_string(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, job_id: &str, suffix: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("v2/crawl/{}{}", job_id, suffix))
    }

    async fn request(&self, method: Method, job_id: &str, suffix: &str) -> ApiResponse {
        let label = format!("{} /v2/crawl/{}{}", method, job_id, suffix);

        let Some(api_key) = &self.api_key else {
            tracing::warn!("{} is not set, skipping {}", self.credential_name, label);
            return ApiResponse::failure(format!(
                "{} is not set; {} was not sent",
                self.credential_name, label
            ));
        };

        let url = match self.endpoint(job_id, suffix) {
            Ok(url) => url,
            Err(e) => return ApiResponse::failure(format!("invalid job URL for {}: {}", label, e)),
        };

        tracing::debug!("Calling {}", label);

        let response = match self
            .client
            .request(method, url)
            .bearer_auth(api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!("{} failed: {}", label, reason);
                return ApiResponse::failure(format!("{} failed: {}", label, reason));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(text) if text.trim().is_empty() => Value::Null,
            Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Err(e) => json!({ "error": format!("failed to read response body: {}", e) }),
        };

        if !status.is_success() {
            tracing::warn!("{} returned HTTP {}", label, status.as_u16());
        }

        ApiResponse {
            ok: status.is_success(),
            status_code: Some(status.as_u16()),
            body,
        }
    }
}

impl JobApi for CrawlApiClient {
    async fn status(&self, job_id: &str) -> ApiResponse {
        self.request(Method::GET, job_id, "").await
    }

    async fn errors(&self, job_id: &str) -> ApiResponse {
        self.request(Method::GET, job_id, "/errors").await
    }

    async fn cancel(&self, job_id: &str) -> ApiResponse {
        self.request(Method::DELETE, job_id, "").await
    }
}
