//! Artifact layout and file writing
//!
//! All artifacts of one run live in `<artifact-root>/<slug>/`. JSON artifacts are written to a
//! temporary sibling and renamed into place, so a reader never observes a partial file.

use crate::SentinelError;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const META_FILE: &str = "run-meta.json";
pub const VIOLATIONS_FILE: &str = "violations.json";

/// Paths of every artifact a run may produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    dir: PathBuf,
    output_file: String,
}

impl ArtifactLayout {
    pub fn new(root: impl AsRef<Path>, slug: &str, output_file: &str) -> Self {
        Self {
            dir: root.as_ref().join(slug),
            output_file: output_file.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the slug directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<(), SentinelError> {
        fs::create_dir_all(&self.dir).map_err(|source| SentinelError::Artifact {
            path: self.dir.clone(),
            source,
        })
    }

    /// The crawl tool's structured result
    pub fn crawl_output(&self) -> PathBuf {
        self.dir.join(&self.output_file)
    }

    pub fn meta(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn violations(&self) -> PathBuf {
        self.dir.join(VIOLATIONS_FILE)
    }

    pub fn attempt_log(&self, attempt: u8) -> PathBuf {
        self.dir.join(format!("attempt-{}.log", attempt))
    }

    pub fn status(&self, attempt: u8) -> PathBuf {
        self.dir.join(format!("status-attempt-{}.json", attempt))
    }

    pub fn errors(&self, attempt: u8) -> PathBuf {
        self.dir.join(format!("errors-attempt-{}.json", attempt))
    }

    pub fn cancel(&self, attempt: u8) -> PathBuf {
        self.dir.join(format!("cancel-attempt-{}.json", attempt))
    }
}

/// Writes a value as pretty-printed JSON, atomically replacing any previous file
pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), SentinelError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_text_artifact(path, &text)
}

/// Writes text, atomically replacing any previous file
pub fn write_text_artifact(path: &Path, text: &str) -> Result<(), SentinelError> {
    let artifact_err = |source| SentinelError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(artifact_err)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, text).map_err(artifact_err)?;
    fs::rename(&tmp, path).map_err(artifact_err)
}

/// Reads and parses a JSON artifact such as the crawl result
pub fn read_json_artifact(path: &Path) -> Result<Value, SentinelError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| SentinelError::CrawlOutput {
        path: path.to_path_buf(),
        source,
    })
}
