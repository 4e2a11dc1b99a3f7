//! Two-attempt crawl sequencing
//!
//! Attempt 1 runs with the configured parameters. If it fails, the remote job is inspected and
//! the failure classified; only a stalled job earns a second, reduced attempt. The sequence never
//! launches the tool more than twice.

use crate::config::{RetryConfig, RetryOverrides, RunConfig};
use crate::output::{read_json_artifact, write_text_artifact, ArtifactLayout, MetaWriter};
use crate::process::{CrawlLauncher, LaunchOutcome};
use crate::remote::{cancel_job, collect_diagnostics, JobApi};
use crate::retry::classify::classify_failure;
use crate::state::{Attempt, AttemptOutcome, FailureKind};
use serde_json::Value;

/// Highest attempt index the controller will ever open
pub const MAX_ATTEMPTS: u8 = 2;

/// How the crawl sequence ended
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlReport {
    /// An attempt exited cleanly and left a parseable result
    Completed { attempt: u8, result: Value },

    /// Every allowed attempt failed
    Exhausted {
        /// Classification that drove the decision: `Stalled` if the first attempt stalled
        reason: FailureKind,
        /// Effective exit code of the last attempt
        exit_code: i32,
        attempts: u8,
    },
}

impl CrawlReport {
    pub fn fallback_needed(&self) -> bool {
        matches!(self, CrawlReport::Exhausted { .. })
    }
}

/// Result of a single attempt, as seen by the sequencer
enum AttemptResult {
    Succeeded(Value),
    Failed { kind: FailureKind, exit_code: i32 },
}

/// Runs the attempt sequence and keeps the run record current
pub struct RetryController<'a, L, A> {
    launcher: &'a L,
    api: &'a A,
    layout: &'a ArtifactLayout,
    meta: &'a MetaWriter,
    retry: &'a RetryConfig,
}

impl<'a, L: CrawlLauncher, A: JobApi> RetryController<'a, L, A> {
    pub fn new(
        launcher: &'a L,
        api: &'a A,
        layout: &'a ArtifactLayout,
        meta: &'a MetaWriter,
        retry: &'a RetryConfig,
    ) -> Self {
        Self {
            launcher,
            api,
            layout,
            meta,
            retry,
        }
    }

    /// Runs attempt 1 and, if it stalled, the reduced attempt 2
    pub async fn run(&self, params: &RunConfig) -> CrawlReport {
        let (kind, exit_code) = match self.run_attempt(1, params, None).await {
            AttemptResult::Succeeded(result) => {
                return CrawlReport::Completed { attempt: 1, result };
            }
            AttemptResult::Failed { kind, exit_code } => (kind, exit_code),
        };

        if kind != FailureKind::Stalled {
            tracing::warn!("Attempt 1 failed without a stall signature, not retrying");
            return CrawlReport::Exhausted {
                reason: kind,
                exit_code,
                attempts: 1,
            };
        }

        if !self.retry.enabled {
            tracing::warn!("Attempt 1 stalled and retry is disabled");
            return CrawlReport::Exhausted {
                reason: kind,
                exit_code,
                attempts: 1,
            };
        }

        let (retry_params, overrides) = params.for_retry(self.retry.sitemap);
        tracing::info!(
            "Attempt 1 stalled, retrying with limit={} max-depth={} max-concurrency={} delay-ms={} sitemap={}",
            overrides.limit,
            overrides.max_depth,
            overrides.max_concurrency,
            overrides.delay_ms,
            overrides.sitemap
        );

        match self
            .run_attempt(MAX_ATTEMPTS, &retry_params, Some(overrides))
            .await
        {
            AttemptResult::Succeeded(result) => CrawlReport::Completed {
                attempt: MAX_ATTEMPTS,
                result,
            },
            AttemptResult::Failed { exit_code, .. } => CrawlReport::Exhausted {
                reason: FailureKind::Stalled,
                exit_code,
                attempts: MAX_ATTEMPTS,
            },
        }
    }

    async fn run_attempt(
        &self,
        index: u8,
        params: &RunConfig,
        overrides: Option<RetryOverrides>,
    ) -> AttemptResult {
        self.meta
            .update(|meta| meta.attempts.push(Attempt::begin(index, overrides)));

        let launch = self.launcher.launch(index, params).await;
        self.record_launch(index, &launch);

        if launch.succeeded() {
            let output = self.launcher.output_path();
            match read_json_artifact(output) {
                Ok(result) => {
                    tracing::info!("Attempt {} succeeded", index);
                    self.meta.update(|meta| {
                        if let Some(attempt) = meta.attempt_mut(index) {
                            attempt.outcome = Some(AttemptOutcome::Success);
                        }
                        meta.artifacts.crawl_output = Some(output.to_path_buf());
                    });
                    return AttemptResult::Succeeded(result);
                }
                Err(e) => {
                    tracing::warn!("Attempt {} exited cleanly but produced no result: {}", index, e);
                    self.meta.update(|meta| {
                        if let Some(attempt) = meta.attempt_mut(index) {
                            attempt.error = Some(e.to_string());
                        }
                    });
                }
            }
        }

        let job_id = launch.job_id.as_deref();
        let diagnostics = collect_diagnostics(self.api, job_id, self.layout, index).await;
        let kind = classify_failure(&launch, diagnostics.remote_status.as_ref());
        tracing::warn!("Attempt {} {}", index, kind);

        self.meta.update(|meta| {
            if let Some(attempt) = meta.attempt_mut(index) {
                attempt.remote_status = diagnostics.remote_status.clone();
                attempt.outcome = Some(kind.into());
            }
            meta.artifacts.status.push(diagnostics.status_path.clone());
            meta.artifacts.errors.push(diagnostics.errors_path.clone());
        });

        if kind == FailureKind::Stalled {
            let cancel = cancel_job(self.api, job_id, self.layout, index).await;
            self.meta.update(|meta| {
                if let Some(attempt) = meta.attempt_mut(index) {
                    attempt.cancel_requested = true;
                    attempt.cancelled = Some(cancel.response.ok);
                }
                meta.artifacts.cancels.push(cancel.path.clone());
            });
        }

        AttemptResult::Failed {
            kind,
            exit_code: launch.effective_exit_code(),
        }
    }

    /// Persists the attempt's output tail and closes the attempt record
    fn record_launch(&self, index: u8, launch: &LaunchOutcome) {
        let log_path = self.layout.attempt_log(index);
        let log_written = match write_text_artifact(&log_path, &launch.output_tail) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        };

        self.meta.update(|meta| {
            if let Some(attempt) = meta.attempt_mut(index) {
                attempt.record_launch(launch);
            }
            if log_written {
                meta.artifacts.logs.push(log_path);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SitemapMode;
    use crate::output::RunMeta;
    use crate::remote::ApiResponse;
    use crate::state::AttemptOutcome;
    use chrono::Utc;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// What a scripted attempt does
    #[derive(Clone)]
    enum Script {
        /// Exit 0 and write the given output file contents
        Exit0(&'static str),
        Exit(i32),
        Timeout,
    }

    struct ScriptedLauncher {
        output: PathBuf,
        scripts: Vec<Script>,
        calls: Mutex<Vec<(u8, RunConfig)>>,
    }

    impl ScriptedLauncher {
        fn new(layout: &ArtifactLayout, scripts: Vec<Script>) -> Self {
            Self {
                output: layout.crawl_output(),
                scripts,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(u8, RunConfig)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CrawlLauncher for ScriptedLauncher {
        async fn launch(&self, index: u8, params: &RunConfig) -> LaunchOutcome {
            self.calls.lock().unwrap().push((index, params.clone()));
            let script = self.scripts[(index - 1) as usize].clone();

            let mut outcome = LaunchOutcome::failed_to_start(Utc::now(), String::new());
            outcome.error = None;
            outcome.job_id = Some(format!("job-{}", index));
            outcome.output_tail = format!("attempt {} output", index);
            match script {
                Script::Exit0(contents) => {
                    std::fs::write(&self.output, contents).unwrap();
                    outcome.exit_code = Some(0);
                }
                Script::Exit(code) => outcome.exit_code = Some(code),
                Script::Timeout => {
                    outcome.exit_code = None;
                    outcome.signal = Some(15);
                    outcome.timed_out = true;
                }
            }
            outcome
        }

        fn output_path(&self) -> &Path {
            &self.output
        }
    }

    struct FakeApi {
        status: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(status: &'static str) -> Self {
            Self {
                status,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ok(body: Value) -> ApiResponse {
            ApiResponse {
                ok: true,
                status_code: Some(200),
                body,
            }
        }
    }

    impl JobApi for FakeApi {
        async fn status(&self, job_id: &str) -> ApiResponse {
            self.calls.lock().unwrap().push(format!("status {}", job_id));
            Self::ok(json!({"status": self.status, "completed": 3, "total": 10}))
        }

        async fn errors(&self, job_id: &str) -> ApiResponse {
            self.calls.lock().unwrap().push(format!("errors {}", job_id));
            Self::ok(json!({"errors": [], "robotsBlocked": []}))
        }

        async fn cancel(&self, job_id: &str) -> ApiResponse {
            self.calls.lock().unwrap().push(format!("cancel {}", job_id));
            Self::ok(json!({"status": "cancelled"}))
        }
    }

    struct Fixture {
        _dir: TempDir,
        layout: ArtifactLayout,
        meta: MetaWriter,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path(), "example", "crawl.json");
        layout.ensure_dir().unwrap();
        let meta = MetaWriter::new(
            layout.meta(),
            RunMeta::new("https://example.com/", "example", &layout),
        );
        Fixture {
            _dir: dir,
            layout,
            meta,
        }
    }

    fn params() -> RunConfig {
        RunConfig {
            limit: 25,
            max_depth: 3,
            max_concurrency: 2,
            delay_ms: 250,
            timeout_secs: Some(60),
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Exit0(r#"{"data": []}"#)]);
        let api = FakeApi::new("completed");
        let retry = RetryConfig::default();

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(
            report,
            CrawlReport::Completed {
                attempt: 1,
                result: json!({"data": []})
            }
        );
        assert_eq!(launcher.calls().len(), 1);
        assert!(api.calls.lock().unwrap().is_empty());

        let meta = f.meta.snapshot();
        assert_eq!(meta.attempts.len(), 1);
        assert_eq!(meta.attempts[0].outcome, Some(AttemptOutcome::Success));
        assert_eq!(meta.attempts[0].job_id.as_deref(), Some("job-1"));
        assert!(!meta.attempts[0].is_open());
        assert_eq!(meta.artifacts.crawl_output, Some(f.layout.crawl_output()));
        assert_eq!(
            std::fs::read_to_string(f.layout.attempt_log(1)).unwrap(),
            "attempt 1 output"
        );
    }

    #[tokio::test]
    async fn test_stall_then_retry_success() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(
            &f.layout,
            vec![Script::Timeout, Script::Exit0(r#"{"data": [{"url": "https://example.com/"}]}"#)],
        );
        let api = FakeApi::new("scraping");
        let retry = RetryConfig::default();

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert!(matches!(report, CrawlReport::Completed { attempt: 2, .. }));

        let calls = launcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, params());
        let retried = &calls[1].1;
        assert_eq!(retried.limit, 8);
        assert_eq!(retried.max_depth, 2);
        assert_eq!(retried.max_concurrency, 1);
        assert_eq!(retried.delay_ms, 1000);
        assert_eq!(retried.sitemap, SitemapMode::Skip);

        assert_eq!(
            *api.calls.lock().unwrap(),
            vec![
                "status job-1".to_string(),
                "errors job-1".to_string(),
                "cancel job-1".to_string()
            ]
        );

        let meta = f.meta.snapshot();
        assert_eq!(meta.attempts.len(), 2);
        let first = &meta.attempts[0];
        assert_eq!(first.outcome, Some(AttemptOutcome::Stalled));
        assert!(first.timed_out);
        assert!(first.cancel_requested);
        assert_eq!(first.cancelled, Some(true));
        assert_eq!(first.remote_status.as_ref().unwrap().status, "scraping");
        assert_eq!(meta.attempts[1].outcome, Some(AttemptOutcome::Success));
        assert_eq!(meta.attempts[1].overrides.as_ref().unwrap().limit, 8);
        assert_eq!(meta.artifacts.cancels, vec![f.layout.cancel(1)]);
        assert!(f.layout.status(1).exists());
        assert!(f.layout.errors(1).exists());
    }

    #[tokio::test]
    async fn test_non_stall_failure_is_not_retried() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Exit(3)]);
        let api = FakeApi::new("failed");
        let retry = RetryConfig::default();

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(
            report,
            CrawlReport::Exhausted {
                reason: FailureKind::Failed,
                exit_code: 3,
                attempts: 1
            }
        );
        assert_eq!(launcher.calls().len(), 1);
        assert!(!api
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("cancel")));

        let meta = f.meta.snapshot();
        assert_eq!(meta.attempts[0].outcome, Some(AttemptOutcome::Failed));
        assert!(!meta.attempts[0].cancel_requested);
        assert!(meta.artifacts.crawl_output.is_none());
    }

    #[tokio::test]
    async fn test_remote_stall_without_timeout_is_retried() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Exit(1), Script::Exit(1)]);
        let api = FakeApi::new("queued");
        let retry = RetryConfig::default();

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(
            report,
            CrawlReport::Exhausted {
                reason: FailureKind::Stalled,
                exit_code: 1,
                attempts: 2
            }
        );
        assert!(report.fallback_needed());
        assert_eq!(launcher.calls().len(), 2);

        let meta = f.meta.snapshot();
        assert!(meta.attempts.iter().all(|a| a.cancel_requested));
        assert_eq!(meta.artifacts.status.len(), 2);
        assert_eq!(meta.artifacts.logs.len(), 2);
    }

    #[tokio::test]
    async fn test_retry_disabled() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Timeout]);
        let api = FakeApi::new("scraping");
        let retry = RetryConfig {
            enabled: false,
            sitemap: None,
        };

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(
            report,
            CrawlReport::Exhausted {
                reason: FailureKind::Stalled,
                exit_code: 143,
                attempts: 1
            }
        );
        assert_eq!(launcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_exit_with_unparseable_output_fails() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Exit0("not json")]);
        let api = FakeApi::new("completed");
        let retry = RetryConfig::default();

        let report = RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(
            report,
            CrawlReport::Exhausted {
                reason: FailureKind::Failed,
                exit_code: 0,
                attempts: 1
            }
        );

        let meta = f.meta.snapshot();
        assert_eq!(meta.attempts[0].outcome, Some(AttemptOutcome::Failed));
        assert!(meta.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("not valid JSON"));
        assert!(meta.artifacts.crawl_output.is_none());
    }

    #[tokio::test]
    async fn test_configured_retry_sitemap() {
        let f = fixture();
        let launcher = ScriptedLauncher::new(&f.layout, vec![Script::Timeout, Script::Exit(1)]);
        let api = FakeApi::new("scraping");
        let retry = RetryConfig {
            enabled: true,
            sitemap: Some(SitemapMode::Only),
        };

        RetryController::new(&launcher, &api, &f.layout, &f.meta, &retry)
            .run(&params())
            .await;

        assert_eq!(launcher.calls()[1].1.sitemap, SitemapMode::Only);
    }
}
