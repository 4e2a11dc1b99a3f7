//! Signal numbers, names and process-group delivery

use std::io;

/// Signal sent when the timeout first fires
#[cfg(unix)]
pub const GRACEFUL_SIGNAL: i32 = libc::SIGTERM;
#[cfg(not(unix))]
pub const GRACEFUL_SIGNAL: i32 = 15;

/// Signal sent when the child ignores the graceful one
#[cfg(unix)]
pub const FORCEFUL_SIGNAL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
pub const FORCEFUL_SIGNAL: i32 = 9;

/// Exit code reported for a child that never confirmed its own termination
pub const FORCED_EXIT_CODE: i32 = 128 + FORCEFUL_SIGNAL;

const NAMES: &[(i32, &str)] = &[
    (1, "SIGHUP"),
    (2, "SIGINT"),
    (3, "SIGQUIT"),
    (6, "SIGABRT"),
    (9, "SIGKILL"),
    (11, "SIGSEGV"),
    (13, "SIGPIPE"),
    (14, "SIGALRM"),
    (15, "SIGTERM"),
];

/// Returns the conventional name of a signal, e.g. `SIGKILL`
pub fn signal_name(signal: i32) -> String {
    NAMES
        .iter()
        .find(|(number, _)| *number == signal)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("SIG{}", signal))
}

/// Sends `signal` to every process in the group `pgid`
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn send_to_group(pgid: i32, signal: i32) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal process group {}", pgid),
        ));
    }

    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid addresses the group.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub fn send_to_group(_pgid: i32, _signal: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are only supported on unix",
    ))
}
