//! Job identifier extraction from the crawl tool's output
//!
//! Each complete output line is scanned as soon as it arrives, so an identifier is captured even
//! when later output pushes it out of the retained tail.

use regex::Regex;
use std::sync::OnceLock;

/// Number of trailing output bytes kept for the attempt log
pub const OUTPUT_TAIL_CHARS: usize = 4000;

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)job id:\s*([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
        )
        .expect("job id pattern is valid")
    })
}

/// Extracts the first `Job ID: <uuid>` identifier from text
pub fn extract_job_id(text: &str) -> Option<String> {
    job_id_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Accumulates output lines: remembers the first job id and a bounded tail
#[derive(Debug, Default)]
pub struct OutputScanner {
    job_id: Option<String>,
    tail: String,
}

impl OutputScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if self.job_id.is_none() {
            if let Some(id) = extract_job_id(line) {
                tracing::debug!("Captured job id {}", id);
                self.job_id = Some(id);
            }
        }

        self.tail.push_str(line);
        self.tail.push('\n');

        if self.tail.len() > OUTPUT_TAIL_CHARS {
            let mut cut = self.tail.len() - OUTPUT_TAIL_CHARS;
            while !self.tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.tail.drain(..cut);
        }
    }

    pub fn into_parts(self) -> (Option<String>, String) {
        (self.job_id, self.tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3f2b8c1e-9a4d-4e6f-b123-0c9d8e7f6a5b";

    #[test]
    fn test_extract_job_id() {
        assert_eq!(
            extract_job_id(&format!("Job ID: {}", ID)),
            Some(ID.to_string())
        );
        assert_eq!(
            extract_job_id(&format!("[crawl] job id:{} started", ID.to_uppercase())),
            Some(ID.to_string())
        );
        assert_eq!(extract_job_id("Job ID: not-a-uuid"), None);
        assert_eq!(extract_job_id("Crawling https://example.com"), None);
    }

    #[test]
    fn test_scanner_keeps_first_id() {
        let mut scanner = OutputScanner::new();
        scanner.push_line("starting");
        scanner.push_line(&format!("Job ID: {}", ID));
        scanner.push_line("Job ID: 00000000-0000-0000-0000-000000000000");

        let (job_id, tail) = scanner.into_parts();
        assert_eq!(job_id.as_deref(), Some(ID));
        assert_eq!(tail.lines().count(), 3);
    }

    #[test]
    fn test_id_survives_tail_eviction() {
        let mut scanner = OutputScanner::new();
        scanner.push_line(&format!("Job ID: {}", ID));
        for i in 0..500 {
            scanner.push_line(&format!("progress line {:04} ..........", i));
        }

        let (job_id, tail) = scanner.into_parts();
        assert!(!tail.contains("Job ID"));
        assert!(tail.len() <= OUTPUT_TAIL_CHARS);
        assert_eq!(job_id.as_deref(), Some(ID));
    }

    #[test]
    fn test_tail_trims_on_char_boundary() {
        let mut scanner = OutputScanner::new();
        for _ in 0..2000 {
            scanner.push_line("€ä");
        }

        let (job_id, tail) = scanner.into_parts();
        assert!(job_id.is_none());
        assert!(tail.len() <= OUTPUT_TAIL_CHARS);
        assert!(tail.ends_with("€ä\n"));
    }
}
