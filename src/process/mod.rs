//! Process module: running the external crawl tool
//!
//! This module contains everything that touches the subprocess:
//! - Building the tool's command line from crawl parameters
//! - Spawning the tool in its own process group and streaming its output
//! - Scraping the remote job id from that output
//! - The three-stage timeout escalation
//! - Process-group cleanup on every exit path

mod command;
mod group;
mod guard;
mod job_id;
mod launcher;
pub mod signals;

pub use command::ToolCommand;
pub use group::ProcessGroupGuard;
pub use guard::{GuardAction, GuardPhase, OnceResolution, TimeoutGuard, TimeoutPolicy};
pub use job_id::{extract_job_id, OutputScanner, OUTPUT_TAIL_CHARS};
pub use launcher::{run_command, CrawlLauncher, LaunchOutcome, ToolLauncher};
