//! Human-readable rendering of a run summary

use crate::output::meta::RunMeta;
use crate::state::Attempt;
use std::fmt::Write;

/// Formats a run summary for the terminal
pub fn format_run_meta(meta: &RunMeta) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl-Sentinel Run Summary ===\n");
    let _ = writeln!(out, "Target: {} ({})", meta.url, meta.slug);
    let _ = writeln!(out, "Started: {}", meta.started_at.to_rfc3339());
    if let Some(finished) = meta.finished_at {
        let _ = writeln!(out, "Finished: {}", finished.to_rfc3339());
    }
    if let Some(ms) = meta.duration_ms {
        let _ = writeln!(out, "Duration: {:.1}s", ms as f64 / 1000.0);
    }
    if let Some(hash) = &meta.config_hash {
        let _ = writeln!(out, "Config hash: {}", hash);
    }

    let _ = writeln!(out, "\nResult: {} (exit code {})", meta.result, meta.exit_code);
    if meta.interrupted {
        let _ = writeln!(out, "  Interrupted by signal");
    }
    if let Some(fallback) = &meta.fallback {
        let _ = writeln!(
            out,
            "  Fallback: {} ({})",
            fallback,
            meta.fallback_reason
                .map(|r| r.as_str())
                .unwrap_or("unknown")
        );
        if let Some(note) = &meta.fallback_note {
            let _ = writeln!(out, "  {}", note);
        }
    }
    if meta.violation_count > 0 {
        let _ = writeln!(out, "  Policy violations: {}", meta.violation_count);
    }
    if let Some(error) = &meta.error {
        let _ = writeln!(out, "  Error: {}", error);
    }

    let _ = writeln!(out, "\nAttempts ({}):", meta.attempts.len());
    for attempt in &meta.attempts {
        format_attempt(&mut out, attempt);
    }

    let _ = writeln!(out, "\nArtifacts: {}", meta.artifacts.dir.display());
    if let Some(path) = &meta.artifacts.crawl_output {
        let _ = writeln!(out, "  Crawl output: {}", path.display());
    }
    if let Some(path) = &meta.artifacts.violations {
        let _ = writeln!(out, "  Violations: {}", path.display());
    }

    out
}

fn format_attempt(out: &mut String, attempt: &Attempt) {
    let outcome = attempt
        .outcome
        .map(|o| format!("{:?}", o).to_lowercase())
        .unwrap_or_else(|| "open".to_string());
    let exit = match (&attempt.exit_code, &attempt.signal) {
        (Some(code), _) => format!("exit {}", code),
        (None, Some(signal)) => signal.clone(),
        (None, None) => "no exit".to_string(),
    };

    let _ = write!(out, "  #{}: {} ({}", attempt.index, outcome, exit);
    if let Some(ms) = attempt.duration_ms {
        let _ = write!(out, ", {:.1}s", ms as f64 / 1000.0);
    }
    if attempt.timed_out {
        let _ = write!(out, ", timed out");
    }
    if attempt.forced {
        let _ = write!(out, ", forced");
    }
    let _ = writeln!(out, ")");

    if let Some(job_id) = &attempt.job_id {
        let _ = writeln!(out, "      job {}", job_id);
    }
    if let Some(status) = &attempt.remote_status {
        let _ = writeln!(
            out,
            "      remote status: {} ({}/{})",
            status.status,
            status.completed.unwrap_or_default(),
            status.total.unwrap_or_default()
        );
    }
    if attempt.cancel_requested {
        let _ = writeln!(
            out,
            "      cancel requested: {}",
            match attempt.cancelled {
                Some(true) => "cancelled",
                _ => "failed",
            }
        );
    }
    if let Some(overrides) = &attempt.overrides {
        let _ = writeln!(
            out,
            "      overrides: limit={} max-depth={} max-concurrency={} delay-ms={} sitemap={}",
            overrides.limit,
            overrides.max_depth,
            overrides.max_concurrency,
            overrides.delay_ms,
            overrides.sitemap
        );
    }
    if let Some(error) = &attempt.error {
        let _ = writeln!(out, "      error: {}", error);
    }
}

/// Prints a run summary to stdout
pub fn print_run_meta(meta: &RunMeta) {
    print!("{}", format_run_meta(meta));
}
