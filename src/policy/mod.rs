//! Content policy: no listing records in crawl output
//!
//! Runs only over a crawl result that parsed successfully. Any violation is fatal for the run,
//! regardless of how the crawl itself ended.

mod patterns;
mod scanner;

pub use patterns::{
    forbidden_segment, listing_content, FORBIDDEN_URL_SEGMENTS, REASON_FORBIDDEN_URL,
    REASON_KEYWORD_WITH_PRICE, REASON_LISTING_FIELD,
};
pub use scanner::{collect_urls, scan_crawl_result, PolicyReport, Violation, TEXT_FIELDS};
