//! Orchestrator module - run-level decisions
//!
//! This module contains the coordinator that drives one invocation from the first attempt to
//! the finalized run record, and the fallback hand-off decision.

mod coordinator;
mod fallback;

pub use coordinator::{
    failure_exit_code, Coordinator, RunOutcome, EXIT_FAILURE, EXIT_INTERRUPTED,
    EXIT_POLICY_VIOLATION, EXIT_SUCCESS,
};
pub use fallback::{apply_fallback, fallback_note, FALLBACK_MODE};
