//! Process-group ownership for the lifetime of an orchestrator run
//!
//! Every crawl tool child is started as the leader of its own process group and registered
//! here. Tearing the guard down (explicitly, on interrupt, or by dropping it) kills every
//! registered group, which takes the tool's descendants with it.

use crate::process::signals::{send_to_group, FORCEFUL_SIGNAL};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct ProcessGroupGuard {
    groups: Mutex<Vec<i32>>,
}

impl ProcessGroupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a process group
    pub fn register(&self, pgid: i32) {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        if !groups.contains(&pgid) {
            groups.push(pgid);
        }
    }

    /// Kills whatever is left of a finished attempt's group and stops tracking it
    pub fn release(&self, pgid: i32) {
        let tracked = {
            let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
            let before = groups.len();
            groups.retain(|g| *g != pgid);
            groups.len() != before
        };

        if tracked {
            if let Err(e) = send_to_group(pgid, FORCEFUL_SIGNAL) {
                tracing::debug!("Failed to clean up process group {}: {}", pgid, e);
            }
        }
    }

    /// Process groups currently tracked
    pub fn live_groups(&self) -> Vec<i32> {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kills every tracked group; safe to call any number of times
    ///
    /// Returns the number of groups signalled by this call.
    pub fn terminate_all(&self) -> usize {
        let groups: Vec<i32> = {
            let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
            groups.drain(..).collect()
        };

        for pgid in &groups {
            tracing::warn!("Terminating crawl process group {}", pgid);
            if let Err(e) = send_to_group(*pgid, FORCEFUL_SIGNAL) {
                tracing::error!("Failed to terminate process group {}: {}", pgid, e);
            }
        }

        groups.len()
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.terminate_all();
    }
}
