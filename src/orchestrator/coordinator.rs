//! Run coordinator - top-level orchestration of one crawl invocation
//!
//! The coordinator ties the pieces together:
//! - Running the attempt sequence through the retry controller
//! - Scanning a successful result against the content policy
//! - Deciding between success, violations, fallback and failure
//! - Tearing down crawl processes and finalizing the run record on interrupt

use crate::config::{Config, FallbackConfig, RetryConfig, RunConfig, Target};
use crate::orchestrator::fallback::apply_fallback;
use crate::output::{write_violations, ArtifactLayout, MetaWriter, RunMeta};
use crate::policy::{scan_crawl_result, Violation};
use crate::process::{CrawlLauncher, ProcessGroupGuard, ToolLauncher};
use crate::remote::{CrawlApiClient, JobApi};
use crate::retry::{CrawlReport, RetryController};
use crate::state::RunResult;
use crate::SentinelError;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_POLICY_VIOLATION: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code reported for a run that produced no usable crawl
///
/// The last attempt's code is kept when it is meaningful; 0 (clean exit, unusable output) and
/// the policy violation code are never reported for a failed crawl.
pub fn failure_exit_code(last_attempt_code: i32) -> i32 {
    match last_attempt_code {
        EXIT_SUCCESS | EXIT_POLICY_VIOLATION => EXIT_FAILURE,
        code => code,
    }
}

/// Final state of an invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: RunResult,
    pub exit_code: i32,
    pub meta_path: PathBuf,
    pub violations: Vec<Violation>,
}

/// Main orchestrator structure
pub struct Coordinator<L = ToolLauncher, A = CrawlApiClient> {
    target: Target,
    params: RunConfig,
    retry: RetryConfig,
    fallback: FallbackConfig,
    layout: ArtifactLayout,
    launcher: L,
    api: A,
    meta: Arc<MetaWriter>,
    groups: Arc<ProcessGroupGuard>,
}

impl Coordinator<ToolLauncher, CrawlApiClient> {
    /// Creates a coordinator that drives the configured crawl tool and job API
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `target` - The resolved crawl target
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SentinelError)` - The API client could not be built
    pub fn from_config(config: &Config, target: Target) -> Result<Self, SentinelError> {
        let layout = ArtifactLayout::new(
            &config.output.artifact_root,
            &target.slug,
            &config.tool.output_file,
        );
        let groups = Arc::new(ProcessGroupGuard::new());
        let launcher = ToolLauncher::new(
            config.tool.clone(),
            target.url.clone(),
            layout.crawl_output(),
            Arc::clone(&groups),
        );
        let api = CrawlApiClient::new(&config.api)?;

        if !api.has_credential() {
            tracing::warn!(
                "{} is not set, remote diagnostics and cancellation will be unavailable",
                config.api.api_key_env
            );
        }

        Ok(Self::new(config, target, layout, launcher, api, groups))
    }
}

impl<L: CrawlLauncher, A: JobApi> Coordinator<L, A> {
    /// Creates a coordinator around an arbitrary launcher and job API
    pub fn new(
        config: &Config,
        target: Target,
        layout: ArtifactLayout,
        launcher: L,
        api: A,
        groups: Arc<ProcessGroupGuard>,
    ) -> Self {
        let meta = RunMeta::new(target.url.as_str(), &target.slug, &layout);
        let meta = Arc::new(MetaWriter::new(layout.meta(), meta));

        Self {
            target,
            params: config.crawl.clone(),
            retry: config.retry.clone(),
            fallback: config.fallback.clone(),
            layout,
            launcher,
            api,
            meta,
            groups,
        }
    }

    /// Records the hash of the configuration file this run was started from
    pub fn with_config_hash(self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        self.meta.update(|meta| meta.config_hash = Some(hash));
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Shared handle to the run record
    pub fn meta(&self) -> Arc<MetaWriter> {
        Arc::clone(&self.meta)
    }

    /// Runs the crawl to completion
    pub async fn run(&self) -> RunOutcome {
        tracing::info!(
            "Starting crawl of {} (slug: {}, artifacts: {})",
            self.target.url,
            self.target.slug,
            self.layout.dir().display()
        );

        match self.execute().await {
            Ok((result, exit_code, violations)) => self.finish(result, exit_code, violations),
            Err(e) => {
                tracing::error!("Run aborted: {}", e);
                self.meta.update(|meta| meta.error = Some(e.to_string()));
                self.finish(RunResult::Failed, EXIT_FAILURE, Vec::new())
            }
        }
    }

    /// Runs the crawl until it completes or `shutdown` resolves, whichever comes first
    pub async fn run_until<F>(&self, shutdown: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.run() => outcome,
            _ = shutdown => self.interrupt(),
        }
    }

    /// Terminates every crawl process and finalizes the run as interrupted
    pub fn interrupt(&self) -> RunOutcome {
        let killed = self.groups.terminate_all();
        tracing::warn!(
            "Interrupted, terminated {} crawl process group(s)",
            killed
        );
        self.meta.update(|meta| meta.interrupted = true);
        self.finish(RunResult::Failed, EXIT_INTERRUPTED, Vec::new())
    }

    async fn execute(&self) -> Result<(RunResult, i32, Vec<Violation>), SentinelError> {
        self.layout.ensure_dir()?;
        remove_stale(&self.layout.violations());

        let controller = RetryController::new(
            &self.launcher,
            &self.api,
            &self.layout,
            &self.meta,
            &self.retry,
        );

        match controller.run(&self.params).await {
            CrawlReport::Completed { attempt, result } => {
                let report = scan_crawl_result(&result);
                tracing::info!(
                    "Attempt {} result scanned: {} page(s), {} URL(s), {} violation(s)",
                    attempt,
                    report.pages_checked,
                    report.urls_checked,
                    report.violations.len()
                );

                if report.is_clean() {
                    return Ok((RunResult::Success, EXIT_SUCCESS, Vec::new()));
                }

                self.record_violations(&report.violations);
                Ok((
                    RunResult::Violations,
                    EXIT_POLICY_VIOLATION,
                    report.violations,
                ))
            }
            CrawlReport::Exhausted {
                reason,
                exit_code,
                attempts,
            } => {
                let exit_code = failure_exit_code(exit_code);
                if !self.fallback.enabled {
                    tracing::error!("Crawl {} and fallback is disabled", reason);
                    return Ok((RunResult::Failed, exit_code, Vec::new()));
                }

                tracing::warn!("Crawl {}, handing off to whitelist scrape", reason);
                self.meta
                    .update(|meta| apply_fallback(meta, reason, attempts));
                Ok((RunResult::Fallback, exit_code, Vec::new()))
            }
        }
    }

    fn record_violations(&self, violations: &[Violation]) {
        let path = self.layout.violations();
        let written = match write_violations(
            &path,
            self.target.url.as_str(),
            &self.target.slug,
            violations,
        ) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        };

        self.meta.update(|meta| {
            meta.violation_count = violations.len();
            if written {
                meta.artifacts.violations = Some(path);
            }
        });
    }

    fn finish(&self, result: RunResult, exit_code: i32, violations: Vec<Violation>) -> RunOutcome {
        let meta_path = self.meta.path().to_path_buf();

        match self.meta.finalize(result, exit_code) {
            Ok(true) => {}
            Ok(false) => {
                let meta = self.meta.snapshot();
                return RunOutcome {
                    result: meta.result,
                    exit_code: meta.exit_code,
                    meta_path,
                    violations,
                };
            }
            Err(e) => tracing::error!("Failed to write run summary: {}", e),
        }

        RunOutcome {
            result,
            exit_code,
            meta_path,
            violations,
        }
    }
}

fn remove_stale(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove stale {}: {}", path.display(), e),
    }
}
