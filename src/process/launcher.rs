//! Crawl tool launcher with a hard wall-clock guard
//!
//! The launcher streams the tool's combined output, scans it for the remote job id and resolves
//! with whichever happens first: the child's own exit, an error while waiting for it, or the
//! forced resolution at the end of the timeout escalation. The orchestrator therefore never
//! blocks on a child that ignores signals.

use crate::config::{RunConfig, ToolConfig};
use crate::process::command::ToolCommand;
use crate::process::group::ProcessGroupGuard;
use crate::process::guard::{GuardAction, OnceResolution, TimeoutGuard, TimeoutPolicy};
use crate::process::job_id::OutputScanner;
use crate::process::signals::{
    send_to_group, signal_name, FORCEFUL_SIGNAL, FORCED_EXIT_CODE, GRACEFUL_SIGNAL,
};
use crate::SentinelError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// How long to keep reading buffered output after the child has exited
const OUTPUT_DRAIN_WINDOW: Duration = Duration::from_millis(500);

/// Result of one crawl tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOutcome {
    /// Exit code, if the child exited on its own (or 137 when force-resolved)
    pub exit_code: Option<i32>,

    /// Terminating signal number, if any
    pub signal: Option<i32>,

    /// The timeout fired during this execution
    pub timed_out: bool,

    /// The child never confirmed termination and the result is synthetic
    pub forced: bool,

    /// Remote job id scraped from the output
    pub job_id: Option<String>,

    /// Last few thousand bytes of combined output
    pub output_tail: String,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    /// Spawn or wait error
    pub error: Option<String>,
}

impl LaunchOutcome {
    /// An execution that could not be started at all
    pub fn failed_to_start(started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            exit_code: Some(1),
            signal: None,
            timed_out: false,
            forced: false,
            job_id: None,
            output_tail: String::new(),
            started_at,
            ended_at: Utc::now(),
            error: Some(error),
        }
    }

    /// True if the tool exited 0 within its time limit
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && self.error.is_none()
    }

    /// Exit code as a shell would report it: signal deaths map to 128 + signal
    pub fn effective_exit_code(&self) -> i32 {
        self.exit_code
            .or(self.signal.map(|s| 128 + s))
            .unwrap_or(1)
    }

    pub fn signal_name(&self) -> Option<String> {
        self.signal.map(signal_name)
    }
}

/// Starts crawl attempts
///
/// The retry controller only depends on this trait, so the sequencing logic can be exercised
/// without spawning real processes.
#[allow(async_fn_in_trait)]
pub trait CrawlLauncher {
    /// Runs attempt `index` with the given parameters and waits for it to resolve
    async fn launch(&self, index: u8, params: &RunConfig) -> LaunchOutcome;

    /// Where the tool writes its structured result
    fn output_path(&self) -> &Path;
}

/// Launches the configured external crawl tool
pub struct ToolLauncher {
    tool: ToolConfig,
    target: Url,
    output_path: PathBuf,
    policy: TimeoutPolicy,
    groups: Arc<ProcessGroupGuard>,
}

impl ToolLauncher {
    pub fn new(
        tool: ToolConfig,
        target: Url,
        output_path: PathBuf,
        groups: Arc<ProcessGroupGuard>,
    ) -> Self {
        Self {
            tool,
            target,
            output_path,
            policy: TimeoutPolicy::default(),
            groups,
        }
    }

    /// Replaces the timeout escalation durations
    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The command line attempt parameters translate to
    pub fn command_for(&self, params: &RunConfig) -> ToolCommand {
        ToolCommand::build(&self.tool, &self.target, params, &self.output_path)
    }
}

impl CrawlLauncher for ToolLauncher {
    async fn launch(&self, index: u8, params: &RunConfig) -> LaunchOutcome {
        // A result left over from an earlier attempt must not pass for this one
        match std::fs::remove_file(&self.output_path) {
            Ok(()) => tracing::debug!("Removed stale output {}", self.output_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove stale output {}: {}",
                self.output_path.display(),
                e
            ),
        }

        let command = self.command_for(params);
        tracing::info!("Attempt {}: {}", index, command);

        run_command(
            &command,
            params.timeout_secs.map(Duration::from_secs),
            self.policy,
            &self.groups,
            self.tool.echo_output,
        )
        .await
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// How the child's execution ended, before timing data is attached
#[derive(Debug)]
struct Exit {
    exit_code: Option<i32>,
    signal: Option<i32>,
    forced: bool,
    error: Option<String>,
}

impl Exit {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            exit_code: status.code(),
            signal,
            forced: false,
            error: None,
        }
    }

    fn wait_error(error: std::io::Error) -> Self {
        Self {
            exit_code: Some(1),
            signal: None,
            forced: false,
            error: Some(format!("waiting for crawl tool failed: {}", error)),
        }
    }

    fn forced() -> Self {
        Self {
            exit_code: Some(FORCED_EXIT_CODE),
            signal: Some(FORCEFUL_SIGNAL),
            forced: true,
            error: None,
        }
    }
}

/// Runs a command to completion under the timeout escalation
///
/// # Arguments
///
/// * `command` - The program and its arguments
/// * `timeout` - Hard limit; `None` waits for a natural exit
/// * `policy` - Escalation durations
/// * `groups` - Registry the child's process group is tracked in while it runs
/// * `echo` - Forward each output line to stdout
pub async fn run_command(
    command: &ToolCommand,
    timeout: Option<Duration>,
    policy: TimeoutPolicy,
    groups: &ProcessGroupGuard,
    echo: bool,
) -> LaunchOutcome {
    run_command_with(command, timeout, policy, groups, echo, signal_child).await
}

/// Delivers an escalation signal to a running child
type SignalSender = fn(&mut Child, Option<i32>, i32);

async fn run_command_with(
    command: &ToolCommand,
    timeout: Option<Duration>,
    policy: TimeoutPolicy,
    groups: &ProcessGroupGuard,
    echo: bool,
    deliver: SignalSender,
) -> LaunchOutcome {
    let started_at = Utc::now();

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            let err = SentinelError::Spawn {
                command: command.program.clone(),
                source,
            };
            tracing::error!("{}", err);
            return LaunchOutcome::failed_to_start(started_at, err.to_string());
        }
    };

    // With process_group(0) the child's pid is also its group id
    let pgid = child.id().map(|id| id as i32);
    if let Some(pgid) = pgid {
        groups.register(pgid);
    }

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        spawn_output_reader(stdout, line_tx.clone(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_output_reader(stderr, line_tx.clone(), "stderr");
    }
    drop(line_tx);

    if let Some(timeout) = timeout {
        tracing::debug!(
            "Crawl tool process group {:?} guarded for at most {:?}",
            pgid,
            policy.worst_case(timeout)
        );
    }

    let mut scanner = OutputScanner::new();
    let mut guard = TimeoutGuard::new(timeout, policy, Instant::now());
    let mut resolution = OnceResolution::new();
    let mut streams_open = true;

    while !resolution.is_resolved() {
        let deadline = guard.deadline();

        tokio::select! {
            status = child.wait() => {
                let exit = match status {
                    Ok(status) => Exit::from_status(status),
                    Err(e) => Exit::wait_error(e),
                };
                resolution.resolve(exit);
            }
            line = line_rx.recv(), if streams_open => {
                match line {
                    Some(line) => handle_line(&mut scanner, &line, echo),
                    None => streams_open = false,
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                match guard.on_deadline(Instant::now()) {
                    Some(GuardAction::SendGraceful) => {
                        tracing::warn!(
                            "Crawl tool exceeded its {}s timeout, sending {}",
                            timeout.map(|t| t.as_secs()).unwrap_or_default(),
                            signal_name(GRACEFUL_SIGNAL)
                        );
                        deliver(&mut child, pgid, GRACEFUL_SIGNAL);
                    }
                    Some(GuardAction::SendForceful) => {
                        tracing::warn!(
                            "Crawl tool ignored {}, sending {}",
                            signal_name(GRACEFUL_SIGNAL),
                            signal_name(FORCEFUL_SIGNAL)
                        );
                        deliver(&mut child, pgid, FORCEFUL_SIGNAL);
                    }
                    Some(GuardAction::ForceResolve) => {
                        tracing::error!(
                            "Crawl tool did not confirm termination after {}, giving up on it",
                            signal_name(FORCEFUL_SIGNAL)
                        );
                        resolution.resolve(Exit::forced());
                    }
                    None => {}
                }
            }
        }
    }

    let exit = resolution.into_inner().unwrap_or_else(Exit::forced);

    if streams_open && !exit.forced {
        let drain = tokio::time::sleep(OUTPUT_DRAIN_WINDOW);
        tokio::pin!(drain);
        loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some(line) => handle_line(&mut scanner, &line, echo),
                    None => break,
                },
                _ = &mut drain => break,
            }
        }
    }

    if let Some(pgid) = pgid {
        groups.release(pgid);
    }

    let (job_id, output_tail) = scanner.into_parts();
    let outcome = LaunchOutcome {
        exit_code: exit.exit_code,
        signal: exit.signal,
        timed_out: guard.timed_out(),
        forced: exit.forced,
        job_id,
        output_tail,
        started_at,
        ended_at: Utc::now(),
        error: exit.error,
    };

    tracing::info!(
        "Crawl tool finished: exit={:?} signal={:?} timed_out={} forced={} job_id={:?}",
        outcome.exit_code,
        outcome.signal_name(),
        outcome.timed_out,
        outcome.forced,
        outcome.job_id
    );

    outcome
}

fn handle_line(scanner: &mut OutputScanner, line: &str, echo: bool) {
    if echo {
        println!("{}", line);
    }
    scanner.push_line(line);
}

/// Delivers a signal to the child's whole group, falling back to the child alone
fn signal_child(child: &mut Child, pgid: Option<i32>, signal: i32) {
    if let Some(pgid) = pgid {
        match send_to_group(pgid, signal) {
            Ok(()) => return,
            Err(e) => tracing::warn!("Failed to signal process group {}: {}", pgid, e),
        }
    }

    if signal == FORCEFUL_SIGNAL {
        if let Err(e) = child.start_kill() {
            tracing::warn!("Failed to kill crawl tool: {}", e);
        }
    }
}

fn spawn_output_reader<R>(stream: R, tx: mpsc::UnboundedSender<String>, stream_name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(format!("[{stream_name} read error] {err}"));
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const ID: &str = "6d0a2f4e-1b3c-4d5e-8f90-a1b2c3d4e5f6";

    fn sh(script: &str) -> ToolCommand {
        ToolCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    fn fast_policy() -> TimeoutPolicy {
        TimeoutPolicy {
            grace: Duration::from_millis(100),
            kill_after: Duration::from_millis(300),
            resolve_after: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn test_natural_exit_captures_job_id() {
        let groups = ProcessGroupGuard::new();
        let command = sh(&format!("echo 'Crawl started'; echo 'Job ID: {}'; exit 0", ID));

        let outcome = run_command(&command, None, fast_policy(), &groups, false).await;

        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.succeeded());
        assert!(!outcome.timed_out);
        assert!(!outcome.forced);
        assert_eq!(outcome.job_id.as_deref(), Some(ID));
        assert!(outcome.output_tail.contains("Crawl started"));
        assert!(groups.live_groups().is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_and_stderr_capture() {
        let groups = ProcessGroupGuard::new();
        let command = sh(&format!("echo 'Job ID: {}' >&2; exit 3", ID));

        let outcome = run_command(&command, None, fast_policy(), &groups, false).await;

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.effective_exit_code(), 3);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.job_id.as_deref(), Some(ID));
    }

    #[tokio::test]
    async fn test_timeout_sends_graceful_signal() {
        let groups = ProcessGroupGuard::new();
        let command = sh("echo waiting; sleep 30");
        let started = std::time::Instant::now();

        let outcome = run_command(
            &command,
            Some(Duration::from_millis(200)),
            fast_policy(),
            &groups,
            false,
        )
        .await;

        assert!(outcome.timed_out);
        assert!(!outcome.forced);
        assert_eq!(outcome.signal, Some(GRACEFUL_SIGNAL));
        assert_eq!(outcome.effective_exit_code(), 128 + GRACEFUL_SIGNAL);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_ignored_term_escalates_to_kill() {
        let groups = ProcessGroupGuard::new();
        let command = sh("trap '' TERM; echo ready; while true; do sleep 1; done");
        let started = std::time::Instant::now();

        let outcome = run_command(
            &command,
            Some(Duration::from_millis(200)),
            fast_policy(),
            &groups,
            false,
        )
        .await;

        assert!(outcome.timed_out);
        assert_eq!(outcome.signal, Some(FORCEFUL_SIGNAL));
        assert_eq!(outcome.effective_exit_code(), FORCED_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    fn ignore_signals(_child: &mut Child, _pgid: Option<i32>, _signal: i32) {}

    #[tokio::test]
    async fn test_unresponsive_child_is_force_resolved() {
        let groups = ProcessGroupGuard::new();
        let command = sh("echo ready; sleep 30");
        let timeout = Duration::from_millis(200);
        let started = std::time::Instant::now();

        let outcome = run_command_with(
            &command,
            Some(timeout),
            fast_policy(),
            &groups,
            false,
            ignore_signals,
        )
        .await;

        assert!(outcome.timed_out);
        assert!(outcome.forced);
        assert_eq!(outcome.exit_code, Some(FORCED_EXIT_CODE));
        assert_eq!(outcome.signal, Some(FORCEFUL_SIGNAL));
        assert_eq!(outcome.effective_exit_code(), FORCED_EXIT_CODE);
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() <= fast_policy().worst_case(timeout) + Duration::from_secs(2));
        assert!(groups.live_groups().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_result() {
        let groups = ProcessGroupGuard::new();
        let command = ToolCommand {
            program: "/nonexistent/crawl-tool".to_string(),
            args: vec![],
        };

        let outcome = run_command(&command, None, fast_policy(), &groups, false).await;

        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.succeeded());
        assert!(outcome.error.unwrap().contains("/nonexistent/crawl-tool"));
    }

    #[test]
    fn test_effective_exit_code() {
        let now = Utc::now();
        let mut outcome = LaunchOutcome::failed_to_start(now, "boom".to_string());
        assert_eq!(outcome.effective_exit_code(), 1);

        outcome.exit_code = None;
        outcome.signal = Some(15);
        assert_eq!(outcome.effective_exit_code(), 143);
        assert_eq!(outcome.signal_name().as_deref(), Some("SIGTERM"));
    }
}
