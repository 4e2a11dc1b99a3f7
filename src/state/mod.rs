//! State tracking for crawl attempts and runs
//!
//! This module defines the attempt record and the classifications attempts and runs end in.

mod attempt;
mod run_result;

pub use attempt::Attempt;
pub use run_result::{AttemptOutcome, FailureKind, RunResult};
