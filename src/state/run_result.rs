//! Terminal classifications of a run and of individual attempts
//!
//! Exactly one [`RunResult`] ends every invocation; attempts carry their own [`AttemptOutcome`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal result of a whole invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    /// An attempt completed and its result passed the content policy
    Success,

    /// Both attempts failed; the caller should hand off to the whitelist scrape
    Fallback,

    /// The run ended without a usable crawl and without a fallback hand-off
    Failed,

    /// The crawl result contained listing pages or listing content
    Violations,
}

impl RunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Failed => "failed",
            Self::Violations => "violations",
        }
    }

}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt did not produce a usable crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Timed out, or the remote job was stuck in a non-terminal state
    Stalled,

    /// Non-zero exit (or unusable output) without a stall signature
    Failed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stalled => "stalled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on a finished attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Stalled,
    Failed,
    /// The orchestrator was interrupted while the attempt was running
    Interrupted,
}

impl From<FailureKind> for AttemptOutcome {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Stalled => Self::Stalled,
            FailureKind::Failed => Self::Failed,
        }
    }
}
