//! Postmortem diagnostics for failed attempts
//!
//! Status and error responses are always persisted, including the recorded failure results for
//! a missing credential or a missing job id, so a run can be inspected after the fact.

use crate::output::{write_json_artifact, ArtifactLayout};
use crate::remote::client::{ApiResponse, JobApi};
use crate::remote::status::RemoteJobStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Status and errors of one attempt's remote job
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub status: ApiResponse,
    pub errors: ApiResponse,
    pub remote_status: Option<RemoteJobStatus>,
    pub status_path: PathBuf,
    pub errors_path: PathBuf,
}

/// Result of a cancellation request
#[derive(Debug, Clone)]
pub struct CancelReport {
    pub response: ApiResponse,
    pub path: PathBuf,
}

/// On-disk form of a raw API response
#[derive(Debug, Serialize)]
struct PersistedResponse<'a> {
    endpoint: String,
    job_id: Option<&'a str>,
    fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    response: &'a ApiResponse,
}

const NO_JOB_ID: &str = "no job id was captured from the crawl tool output";

/// Fetches and persists status and errors for an attempt's job
pub async fn collect_diagnostics<A: JobApi>(
    api: &A,
    job_id: Option<&str>,
    layout: &ArtifactLayout,
    attempt: u8,
) -> Diagnostics {
    let (status, errors) = match job_id {
        Some(id) => (api.status(id).await, api.errors(id).await),
        None => {
            tracing::warn!("Attempt {}: {}, remote diagnostics unavailable", attempt, NO_JOB_ID);
            (ApiResponse::failure(NO_JOB_ID), ApiResponse::failure(NO_JOB_ID))
        }
    };

    let remote_status = if status.ok {
        RemoteJobStatus::from_body(&status.body)
    } else {
        None
    };
    if let Some(snapshot) = &remote_status {
        tracing::info!(
            "Attempt {}: remote job status '{}' ({}/{} pages)",
            attempt,
            snapshot.status,
            snapshot.completed.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()),
            snapshot.total.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
        );
    }

    let status_path = layout.status(attempt);
    let errors_path = layout.errors(attempt);
    persist(&status_path, "GET /v2/crawl/{jobId}", job_id, &status);
    persist(&errors_path, "GET /v2/crawl/{jobId}/errors", job_id, &errors);

    Diagnostics {
        status,
        errors,
        remote_status,
        status_path,
        errors_path,
    }
}

/// Requests cancellation of a stalled job; failure is recorded, never raised
pub async fn cancel_job<A: JobApi>(
    api: &A,
    job_id: Option<&str>,
    layout: &ArtifactLayout,
    attempt: u8,
) -> CancelReport {
    let response = match job_id {
        Some(id) => {
            tracing::info!("Attempt {}: cancelling stalled remote job {}", attempt, id);
            api.cancel(id).await
        }
        None => ApiResponse::failure(NO_JOB_ID),
    };

    if !response.ok {
        tracing::warn!("Attempt {}: remote job cancellation failed", attempt);
    }

    let path = layout.cancel(attempt);
    persist(&path, "DELETE /v2/crawl/{jobId}", job_id, &response);

    CancelReport { response, path }
}

fn persist(path: &Path, endpoint: &str, job_id: Option<&str>, response: &ApiResponse) {
    let record = PersistedResponse {
        endpoint: endpoint.to_string(),
        job_id,
        fetched_at: Utc::now(),
        response,
    };
    if let Err(e) = write_json_artifact(path, &record) {
        tracing::warn!("{}", e);
    }
}
