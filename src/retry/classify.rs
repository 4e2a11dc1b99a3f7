use crate::process::LaunchOutcome;
use crate::remote::RemoteJobStatus;
use crate::state::FailureKind;

/// Classifies a failed attempt
///
/// An attempt is stalled if the tool timed out or the remote job is still in one of the
/// non-terminal stalled states; anything else is a plain failure. A missing status snapshot
/// (no credential, no job id, API error) leaves only the timeout signal to go on.
pub fn classify_failure(launch: &LaunchOutcome, remote: Option<&RemoteJobStatus>) -> FailureKind {
    let remote_stalled = remote.map(RemoteJobStatus::is_stalled).unwrap_or(false);

    if launch.timed_out || remote_stalled {
        FailureKind::Stalled
    } else {
        FailureKind::Failed
    }
}
