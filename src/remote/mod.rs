//! Remote job API: status, errors and cancellation of crawl jobs
//!
//! A missing credential degrades every call to a recorded failure result; nothing in this module
//! aborts the orchestrator.

mod client;
mod diagnostics;
mod status;

pub use client::{build_http_client, ApiResponse, CrawlApiClient, JobApi};
pub use diagnostics::{cancel_job, collect_diagnostics, CancelReport, Diagnostics};
pub use status::{RemoteJobStatus, STALLED_STATUSES};
