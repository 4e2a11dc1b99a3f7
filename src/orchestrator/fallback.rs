use crate::output::RunMeta;
use crate::state::FailureKind;

/// Downstream collaborator the run hands off to when the crawl is exhausted
pub const FALLBACK_MODE: &str = "scrape";

/// Human-readable explanation of why the hand-off happened
pub fn fallback_note(reason: FailureKind, attempts: u8) -> String {
    match (reason, attempts) {
        (FailureKind::Stalled, 1) => {
            "crawl stalled and no retry was made; run the whitelist scrape instead".to_string()
        }
        (FailureKind::Stalled, _) => {
            "crawl stalled and the reduced retry did not complete either; run the whitelist scrape instead"
                .to_string()
        }
        (FailureKind::Failed, _) => {
            "crawl failed without a stall signature; run the whitelist scrape instead".to_string()
        }
    }
}

/// Marks the run as handed off to the whitelist scrape
///
/// Fallback and violations are mutually exclusive: a run with violations is never marked.
/// Returns whether the record was changed.
pub fn apply_fallback(meta: &mut RunMeta, reason: FailureKind, attempts: u8) -> bool {
    if meta.violation_count > 0 {
        tracing::debug!("Run has policy violations, not marking fallback");
        return false;
    }

    meta.fallback = Some(FALLBACK_MODE.to_string());
    meta.fallback_reason = Some(reason);
    meta.fallback_note = Some(fallback_note(reason, attempts));
    true
}
