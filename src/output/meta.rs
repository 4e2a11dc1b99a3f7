//! Run summary record and its write-once writer

use crate::output::artifacts::{write_json_artifact, ArtifactLayout};
use crate::state::{Attempt, FailureKind, RunResult};
use crate::SentinelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Locations of the artifacts a run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub dir: PathBuf,
    pub meta: PathBuf,
    /// Present only when an attempt produced a parseable crawl result
    pub crawl_output: Option<PathBuf>,
    pub violations: Option<PathBuf>,
    pub logs: Vec<PathBuf>,
    pub status: Vec<PathBuf>,
    pub errors: Vec<PathBuf>,
    pub cancels: Vec<PathBuf>,
}

/// The single persisted record of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub url: String,
    pub slug: String,
    pub config_hash: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,

    pub attempts: Vec<Attempt>,

    pub result: RunResult,
    pub exit_code: i32,

    /// `"scrape"` when the caller should hand off to the whitelist scrape
    pub fallback: Option<String>,
    pub fallback_reason: Option<FailureKind>,
    pub fallback_note: Option<String>,

    pub violation_count: usize,
    pub interrupted: bool,

    /// Internal error that cut the run short, if any
    pub error: Option<String>,

    pub artifacts: ArtifactIndex,
}

impl RunMeta {
    /// A fresh record; the result stays `failed` until the run decides otherwise
    pub fn new(url: &str, slug: &str, layout: &ArtifactLayout) -> Self {
        Self {
            url: url.to_string(),
            slug: slug.to_string(),
            config_hash: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            attempts: Vec::new(),
            result: RunResult::Failed,
            exit_code: 1,
            fallback: None,
            fallback_reason: None,
            fallback_note: None,
            violation_count: 0,
            interrupted: false,
            error: None,
            artifacts: ArtifactIndex {
                dir: layout.dir().to_path_buf(),
                meta: layout.meta(),
                ..ArtifactIndex::default()
            },
        }
    }

    pub fn attempt_mut(&mut self, index: u8) -> Option<&mut Attempt> {
        self.attempts.iter_mut().find(|a| a.index == index)
    }
}

/// Owns the run record and writes it exactly once
///
/// The record is shared between the coordinator and the interrupt path; whichever finalizes
/// first writes the file and every later call is a no-op.
#[derive(Debug)]
pub struct MetaWriter {
    path: PathBuf,
    meta: Mutex<RunMeta>,
    written: AtomicBool,
}

impl MetaWriter {
    pub fn new(path: PathBuf, meta: RunMeta) -> Self {
        Self {
            path,
            meta: Mutex::new(meta),
            written: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies a change to the in-memory record
    pub fn update<R>(&self, f: impl FnOnce(&mut RunMeta) -> R) -> R {
        let mut meta = self.meta.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut meta)
    }

    pub fn snapshot(&self) -> RunMeta {
        self.meta
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }

    /// Sets the terminal result and writes the record
    ///
    /// Attempts left open or unclassified are closed as interrupted first. Returns `Ok(false)`
    /// without touching the file if the record was already finalized.
    pub fn finalize(&self, result: RunResult, exit_code: i32) -> Result<bool, SentinelError> {
        if self.written.swap(true, Ordering::SeqCst) {
            tracing::debug!("Run summary already written, ignoring {} finalization", result);
            return Ok(false);
        }

        let snapshot = self.update(|meta| {
            let now = Utc::now();
            for attempt in &mut meta.attempts {
                attempt.close_interrupted(now);
            }
            meta.result = result;
            meta.exit_code = exit_code;
            meta.finished_at = Some(now);
            meta.duration_ms = Some((now - meta.started_at).num_milliseconds().max(0) as u64);
            meta.clone()
        });

        write_json_artifact(&self.path, &snapshot)?;
        tracing::info!(
            "Run summary written to {} (result: {}, exit code: {})",
            self.path.display(),
            result,
            exit_code
        );
        Ok(true)
    }
}

/// Loads a previously written run summary
pub fn load_meta(path: &Path) -> Result<RunMeta, SentinelError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
