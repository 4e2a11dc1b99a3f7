//! Integration tests for the orchestrator
//!
//! These tests drive the real launcher with small `sh` scripts standing in for the crawl tool,
//! and use wiremock for the remote job API.

#![cfg(unix)]

use crawl_sentinel::config::{parse_config, Config};
use crawl_sentinel::output::{load_meta, read_json_artifact, ArtifactLayout};
use crawl_sentinel::process::{ProcessGroupGuard, TimeoutPolicy, ToolLauncher};
use crawl_sentinel::remote::CrawlApiClient;
use crawl_sentinel::{AttemptOutcome, Coordinator, FailureKind, RunResult};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_ID: &str = "3f2b8c1e-9a7d-4e6f-b5c4-0d1e2f3a4b5c";

/// Argument parsing shared by every fake crawl tool
const PREAMBLE: &str = r#"
out=""
limit=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --limit) limit="$2"; shift ;;
  esac
  shift
done
echo "Starting crawl"
"#;

const CLEAN_RESULT: &str = r#"{"success": true, "data": [{"markdown": "Wir beraten Eigentümer in Berlin.", "metadata": {"sourceURL": "https://example.com/leistungen"}}]}"#;

const LISTING_RESULT: &str = r#"{"success": true, "data": [{"markdown": "Schöne Wohnung, Kaltmiete 950 €", "metadata": {"sourceURL": "https://example.com/mieten/wohnung-42"}}]}"#;

fn fast_policy() -> TimeoutPolicy {
    TimeoutPolicy {
        grace: Duration::from_millis(100),
        kill_after: Duration::from_millis(500),
        resolve_after: Duration::from_millis(500),
    }
}

/// Writes a fake crawl tool script and returns its path
fn write_tool(dir: &Path, body: &str) -> PathBuf {
    let script = dir.join("fake-crawl.sh");
    let contents = format!("{}echo 'Job ID: {}'\n{}\n", PREAMBLE, JOB_ID, body);
    std::fs::write(&script, contents).expect("Failed to write fake tool");
    script
}

fn create_test_config(dir: &TempDir, script: &Path, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[target]
url = "https://www.example.com/"

[tool]
command = "sh"
args = ["{}"]
echo-output = false

[output]
artifact-root = "{}"

{}
"#,
        script.display(),
        dir.path().join("artifacts").display(),
        extra
    ))
    .expect("Failed to parse test config")
}

fn create_coordinator(
    config: &Config,
    api_base: &str,
    api_key: Option<&str>,
) -> Coordinator<ToolLauncher, CrawlApiClient> {
    let target = config.resolve_target(None, None).unwrap();
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
    )
    .with_policy(fast_policy());
    let api = CrawlApiClient::with_api_key(
        api_base,
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();

    Coordinator::new(config, target, layout, launcher, api, groups)
}

async fn mount_stalled_job(server: &MockServer, expected_cancels: u64) {
    let job_path = format!("/v2/crawl/{}", JOB_ID);

    Mock::given(method("GET"))
        .and(path(job_path.clone()))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "status": "scraping",
            "completed": 4,
            "total": 25
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/errors", job_path)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errors": [], "robotsBlocked": []})),
        )
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(job_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "cancelled"})))
        .expect(expected_cancels)
        .mount(server)
        .await;
}

/// True once the process no longer exists or is only waiting to be reaped
fn process_is_gone(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .map(|state| state == "Z" || state == "X")
            .unwrap_or(true),
    }
}

async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..40 {
        if process_is_gone(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn read_pid(path: &Path) -> u32 {
    std::fs::read_to_string(path)
        .expect("Failed to read pid file")
        .trim()
        .parse()
        .expect("Pid file did not hold a pid")
}

#[tokio::test]
async fn test_clean_crawl_succeeds() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let script = write_tool(
        dir.path(),
        &format!("echo '{}' > \"$out\"\nexit 0", CLEAN_RESULT),
    );
    let config = create_test_config(&dir, &script, "[crawl]\ntimeout = 10");
    let coordinator = create_coordinator(&config, &server.uri(), Some("test-key"));

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Success);
    assert_eq!(outcome.exit_code, 0);

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert_eq!(meta.slug, "example-com");
    assert_eq!(meta.attempts.len(), 1);
    assert_eq!(meta.attempts[0].job_id.as_deref(), Some(JOB_ID));
    assert_eq!(meta.attempts[0].exit_code, Some(0));
    assert!(!meta.attempts[0].timed_out);
    assert!(meta.fallback.is_none());

    let log = std::fs::read_to_string(coordinator.layout().attempt_log(1)).unwrap();
    assert!(log.contains("Starting crawl"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stalled_crawl_recovers_on_retry() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_stalled_job(&server, 1).await;

    let script = write_tool(
        dir.path(),
        &format!(
            "if [ \"$limit\" = \"8\" ]; then\n  echo '{}' > \"$out\"\n  exit 0\nfi\nsleep 30",
            CLEAN_RESULT
        ),
    );
    let config = create_test_config(&dir, &script, "[crawl]\nlimit = 40\ntimeout = 1");
    let coordinator = create_coordinator(&config, &server.uri(), Some("test-key"));
    let started = std::time::Instant::now();

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Success);
    assert_eq!(outcome.exit_code, 0);
    assert!(started.elapsed() < Duration::from_secs(15));

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert_eq!(meta.attempts.len(), 2);

    let first = &meta.attempts[0];
    assert!(first.timed_out);
    assert_eq!(first.signal.as_deref(), Some("SIGTERM"));
    assert_eq!(first.outcome, Some(AttemptOutcome::Stalled));
    assert_eq!(first.remote_status.as_ref().unwrap().status, "scraping");
    assert!(first.cancel_requested);
    assert_eq!(first.cancelled, Some(true));

    let second = &meta.attempts[1];
    assert_eq!(second.outcome, Some(AttemptOutcome::Success));
    let overrides = second.overrides.as_ref().unwrap();
    assert_eq!(overrides.limit, 8);
    assert_eq!(overrides.max_concurrency, 1);

    let status = read_json_artifact(&coordinator.layout().status(1)).unwrap();
    assert_eq!(status["job_id"], JOB_ID);
    assert_eq!(status["body"]["status"], "scraping");
}

#[tokio::test]
async fn test_repeated_stall_hands_off_to_scrape() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_stalled_job(&server, 2).await;

    let script = write_tool(dir.path(), "sleep 30");
    let config = create_test_config(&dir, &script, "[crawl]\ntimeout = 1");
    let coordinator = create_coordinator(&config, &server.uri(), Some("test-key"));

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Fallback);
    assert_eq!(outcome.exit_code, 143);

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert_eq!(meta.result, RunResult::Fallback);
    assert_eq!(meta.fallback.as_deref(), Some("scrape"));
    assert_eq!(meta.fallback_reason, Some(FailureKind::Stalled));
    assert!(meta.fallback_note.is_some());
    assert_eq!(meta.attempts.len(), 2);
    assert!(meta
        .attempts
        .iter()
        .all(|a| a.outcome == Some(AttemptOutcome::Stalled) && !a.is_open()));
    assert_eq!(meta.artifacts.cancels.len(), 2);
    assert!(meta.artifacts.crawl_output.is_none());
}

#[tokio::test]
async fn test_missing_credential_still_records_diagnostics() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let script = write_tool(dir.path(), "sleep 30");
    let config = create_test_config(
        &dir,
        &script,
        "[crawl]\ntimeout = 1\n\n[retry]\nenabled = false",
    );
    let coordinator = create_coordinator(&config, &server.uri(), None);

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Fallback);
    assert!(server.received_requests().await.unwrap().is_empty());

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert_eq!(meta.attempts.len(), 1);
    assert_eq!(meta.fallback_reason, Some(FailureKind::Stalled));
    assert!(meta.attempts[0].remote_status.is_none());
    assert_eq!(meta.attempts[0].cancelled, Some(false));

    let status = read_json_artifact(&coordinator.layout().status(1)).unwrap();
    assert_eq!(status["ok"], false);
    assert!(status["body"]["error"]
        .as_str()
        .unwrap()
        .contains("is not set"));
}

#[tokio::test]
async fn test_clean_exit_without_output_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let script = write_tool(dir.path(), "exit 0");
    let config = create_test_config(&dir, &script, "");
    let coordinator = create_coordinator(&config, &server.uri(), None);

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Fallback);
    assert_eq!(outcome.exit_code, 1);

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert_eq!(meta.attempts.len(), 1);
    assert_eq!(meta.attempts[0].outcome, Some(AttemptOutcome::Failed));
    assert!(meta.attempts[0].error.is_some());
    assert_eq!(meta.fallback_reason, Some(FailureKind::Failed));
}

#[tokio::test]
async fn test_listing_content_is_reported() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let script = write_tool(
        dir.path(),
        &format!("echo '{}' > \"$out\"\nexit 0", LISTING_RESULT),
    );
    let config = create_test_config(&dir, &script, "");
    let coordinator = create_coordinator(&config, &server.uri(), Some("test-key"));

    let outcome = coordinator.run().await;

    assert_eq!(outcome.result, RunResult::Violations);
    assert_eq!(outcome.exit_code, 2);
    assert!(outcome
        .violations
        .iter()
        .any(|v| v.url == "https://example.com/mieten/wohnung-42"));

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert!(meta.fallback.is_none());
    assert_eq!(meta.violation_count, outcome.violations.len());

    let violations = read_json_artifact(&coordinator.layout().violations()).unwrap();
    assert_eq!(violations["count"], outcome.violations.len());
    assert_eq!(violations["slug"], "example-com");
}

#[tokio::test]
async fn test_interrupt_kills_tool_and_descendants() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let script = write_tool(
        dir.path(),
        "dir=$(dirname \"$out\")\nsleep 60 &\necho $! > \"$dir/child.pid\"\necho $$ > \"$dir/tool.pid\"\nwait",
    );
    let config = create_test_config(&dir, &script, "");
    let coordinator = create_coordinator(&config, &server.uri(), Some("test-key"));
    let tool_pid_file = coordinator.layout().dir().join("tool.pid");
    let child_pid_file = coordinator.layout().dir().join("child.pid");

    let shutdown = {
        let tool_pid_file = tool_pid_file.clone();
        async move {
            while !tool_pid_file.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    let outcome = coordinator.run_until(shutdown).await;

    assert_eq!(outcome.result, RunResult::Failed);
    assert_eq!(outcome.exit_code, 130);

    assert!(wait_until_gone(read_pid(&tool_pid_file)).await);
    assert!(wait_until_gone(read_pid(&child_pid_file)).await);

    let meta = load_meta(&outcome.meta_path).unwrap();
    assert!(meta.interrupted);
    assert_eq!(meta.result, RunResult::Failed);
    assert_eq!(meta.attempts.len(), 1);
    assert_eq!(meta.attempts[0].outcome, Some(AttemptOutcome::Interrupted));
    assert!(!meta.attempts[0].is_open());
}
