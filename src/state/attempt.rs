use crate::config::RetryOverrides;
use crate::process::LaunchOutcome;
use crate::remote::RemoteJobStatus;
use crate::state::run_result::AttemptOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution of the crawl tool
///
/// An attempt is opened when the tool is launched and closed once the tool is confirmed
/// terminated, either by its own exit or by forced resolution. Attempts still open when the run
/// ends are closed as interrupted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1 or 2
    pub index: u8,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,

    pub exit_code: Option<i32>,

    /// Name of the terminating signal, e.g. `SIGKILL`
    pub signal: Option<String>,

    pub timed_out: bool,

    /// The result was synthesized because the tool never confirmed termination
    pub forced: bool,

    pub job_id: Option<String>,

    pub remote_status: Option<RemoteJobStatus>,

    pub outcome: Option<AttemptOutcome>,

    /// Parameter overrides applied to this attempt (retry only)
    pub overrides: Option<RetryOverrides>,

    pub cancel_requested: bool,

    /// Whether the cancel request succeeded, when one was made
    pub cancelled: Option<bool>,

    pub error: Option<String>,
}

impl Attempt {
    /// Opens a new attempt
    pub fn begin(index: u8, overrides: Option<RetryOverrides>) -> Self {
        Self {
            index,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            exit_code: None,
            signal: None,
            timed_out: false,
            forced: false,
            job_id: None,
            remote_status: None,
            outcome: None,
            overrides,
            cancel_requested: false,
            cancelled: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Records how the tool execution ended and closes the attempt
    pub fn record_launch(&mut self, launch: &LaunchOutcome) {
        self.started_at = launch.started_at;
        self.exit_code = launch.exit_code;
        self.signal = launch.signal_name();
        self.timed_out = launch.timed_out;
        self.forced = launch.forced;
        self.job_id = launch.job_id.clone();
        if launch.error.is_some() {
            self.error = launch.error.clone();
        }
        self.close(launch.ended_at);
    }

    /// Closes the attempt; later calls keep the first end time
    pub fn close(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(at);
        self.duration_ms = Some((at - self.started_at).num_milliseconds().max(0) as u64);
    }

    /// Closes an attempt the run ended without classifying
    ///
    /// Covers both an attempt still running at interrupt and one whose tool had exited but whose
    /// diagnostics were cut short. An attempt that already has an outcome keeps it.
    pub fn close_interrupted(&mut self, at: DateTime<Utc>) {
        if self.outcome.is_none() {
            self.outcome = Some(AttemptOutcome::Interrupted);
        }
        self.close(at);
    }
}
