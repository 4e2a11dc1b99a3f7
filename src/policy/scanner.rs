//! Recursive content policy scan over a crawl result

use crate::policy::patterns::{forbidden_segment, listing_content, REASON_FORBIDDEN_URL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields whose text makes up a page record
pub const TEXT_FIELDS: &[&str] = &["content", "markdown", "rawText", "raw_text", "text", "description"];

const UNKNOWN_URL: &str = "<unknown>";

/// A crawled page that breaks the content policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub url: String,
    pub reason: String,
    /// The segment or text that triggered the violation
    pub matched: String,
}

/// Outcome of scanning one crawl result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyReport {
    pub violations: Vec<Violation>,
    pub urls_checked: usize,
    pub pages_checked: usize,
}

impl PolicyReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Scans a parsed crawl result with both policy checks
///
/// Every URL-like field anywhere in the tree is checked against the forbidden segments, and
/// every page-like record's text is checked for listing content. Violations are reported once
/// per (url, reason).
pub fn scan_crawl_result(result: &Value) -> PolicyReport {
    let mut report = PolicyReport::default();
    let mut seen = HashSet::new();

    let mut urls = Vec::new();
    collect_urls(result, &mut urls);
    report.urls_checked = urls.len();

    for url in urls {
        if let Some(segment) = forbidden_segment(&url) {
            push_violation(&mut report, &mut seen, &url, REASON_FORBIDDEN_URL, segment);
        }
    }

    let mut pages = Vec::new();
    collect_pages(result, &mut pages);
    report.pages_checked = pages.len();

    for page in pages {
        let text = page_text(page);
        if let Some((reason, matched)) = listing_content(&text) {
            let url = page_url(page).unwrap_or_else(|| UNKNOWN_URL.to_string());
            push_violation(&mut report, &mut seen, &url, reason, &matched);
        }
    }

    if report.is_clean() {
        tracing::info!(
            "Content policy passed: {} URLs, {} pages checked",
            report.urls_checked,
            report.pages_checked
        );
    } else {
        for violation in &report.violations {
            tracing::error!(
                "Policy violation at {}: {} ({})",
                violation.url,
                violation.reason,
                violation.matched
            );
        }
    }

    report
}

fn push_violation(
    report: &mut PolicyReport,
    seen: &mut HashSet<(String, String)>,
    url: &str,
    reason: &str,
    matched: &str,
) {
    if seen.insert((url.to_string(), reason.to_string())) {
        report.violations.push(Violation {
            url: url.to_string(),
            reason: reason.to_string(),
            matched: matched.to_string(),
        });
    }
}

fn is_url_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.ends_with("url") || key.ends_with("urls")
}

/// Collects every string held by a URL-like field, at any depth
pub fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_url_key(key) {
                    match child {
                        Value::String(url) => out.push(url.clone()),
                        Value::Array(items) => {
                            out.extend(items.iter().filter_map(Value::as_str).map(str::to_string))
                        }
                        _ => {}
                    }
                }
                collect_urls(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_urls(item, out);
            }
        }
        _ => {}
    }
}

fn is_page(map: &Map<String, Value>) -> bool {
    TEXT_FIELDS
        .iter()
        .any(|field| map.get(*field).map(Value::is_string).unwrap_or(false))
}

/// Collects page-like records; a page's own children are not searched for further pages
fn collect_pages<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Object(map) if is_page(map) => out.push(map),
        Value::Object(map) => {
            for child in map.values() {
                collect_pages(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_pages(item, out);
            }
        }
        _ => {}
    }
}

fn text_fields(map: &Map<String, Value>) -> impl Iterator<Item = &str> {
    TEXT_FIELDS
        .iter()
        .filter_map(move |field| map.get(*field).and_then(Value::as_str))
}

/// Concatenates a page's text fields, including those of its `metadata` object
fn page_text(page: &Map<String, Value>) -> String {
    let mut parts: Vec<&str> = text_fields(page).collect();
    if let Some(Value::Object(metadata)) = page.get("metadata") {
        parts.extend(text_fields(metadata));
    }
    parts.join("\n")
}

/// Keys naming the address a page was crawled from, most specific first
const PAGE_URL_KEYS: &[&str] = &["url", "sourceURL", "sourceUrl", "source_url"];

/// Keys naming an address the page merely declares for itself
const DECLARED_URL_KEYS: &[&str] = &["canonicalUrl", "canonicalURL", "ogUrl", "og:url"];

/// The address a content violation is reported under
///
/// The crawled address wins over declared ones, so a listing page whose `og:url` points at the
/// site root is still reported under its own path. Any other URL-like key is the last resort.
fn page_url(page: &Map<String, Value>) -> Option<String> {
    let metadata = page.get("metadata").and_then(Value::as_object);
    let scopes: Vec<&Map<String, Value>> = std::iter::once(page).chain(metadata).collect();

    for keys in [PAGE_URL_KEYS, DECLARED_URL_KEYS] {
        for scope in &scopes {
            if let Some(url) = keys
                .iter()
                .find_map(|key| scope.get(*key).and_then(Value::as_str))
            {
                return Some(url.to_string());
            }
        }
    }

    scopes.iter().find_map(|scope| {
        scope
            .iter()
            .find(|(key, value)| is_url_key(key) && value.is_string())
            .and_then(|(_, value)| value.as_str())
            .map(str::to_string)
    })
}
