use crate::output::artifacts::write_json_artifact;
use crate::policy::Violation;
use crate::SentinelError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ViolationsArtifact<'a> {
    url: &'a str,
    slug: &'a str,
    scanned_at: DateTime<Utc>,
    count: usize,
    violations: &'a [Violation],
}

/// Writes the dedicated violations artifact for a run
pub fn write_violations(
    path: &Path,
    url: &str,
    slug: &str,
    violations: &[Violation],
) -> Result<(), SentinelError> {
    let artifact = ViolationsArtifact {
        url,
        slug,
        scanned_at: Utc::now(),
        count: violations.len(),
        violations,
    };
    write_json_artifact(path, &artifact)?;
    tracing::warn!(
        "{} content policy violation(s) written to {}",
        violations.len(),
        path.display()
    );
    Ok(())
}
