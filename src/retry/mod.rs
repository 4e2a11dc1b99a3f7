//! Retry module for stalled crawl jobs
//!
//! This module handles:
//! - Classifying failed attempts as stalled or plain failures
//! - Sequencing the first attempt and the reduced retry attempt

mod classify;
mod controller;

pub use classify::classify_failure;
pub use controller::{CrawlReport, RetryController, MAX_ATTEMPTS};
