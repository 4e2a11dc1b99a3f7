//! Remote crawl job status snapshot

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote states in which a job is considered stuck when the local attempt has failed
pub const STALLED_STATUSES: &[&str] = &["scraping", "queued"];

/// A status snapshot as reported by `GET /v2/crawl/{jobId}`
///
/// Snapshots are fetched on demand and never reused across attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJobStatus {
    pub status: String,
    pub completed: Option<u64>,
    pub total: Option<u64>,
}

impl RemoteJobStatus {
    /// Extracts a snapshot from a status response body
    ///
    /// Returns None when the body carries no `status` string.
    pub fn from_body(body: &Value) -> Option<Self> {
        let status = body.get("status")?.as_str()?.trim().to_lowercase();
        if status.is_empty() {
            return None;
        }

        Some(Self {
            status,
            completed: body.get("completed").and_then(Value::as_u64),
            total: body.get("total").and_then(Value::as_u64),
        })
    }

    /// Returns true if the remote job is still in a non-terminal state
    pub fn is_stalled(&self) -> bool {
        STALLED_STATUSES.contains(&self.status.as_str())
    }
}
