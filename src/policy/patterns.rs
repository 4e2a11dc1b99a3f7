//! Listing detection patterns
//!
//! Listing pages are recognised by URL path segments and by the field labels and price amounts
//! real-estate listings carry in their text.

use regex::Regex;
use std::sync::OnceLock;

pub const REASON_FORBIDDEN_URL: &str = "URL matched forbidden listing pattern";
pub const REASON_LISTING_FIELD: &str = "listing field keyword";
pub const REASON_KEYWORD_WITH_PRICE: &str = "listing keyword with price";

/// Path segments that mark listing, offer, purchase or rental pages (matched lowercase)
pub const FORBIDDEN_URL_SEGMENTS: &[&str] = &[
    "/kaufen",
    "/mieten",
    "/expose",
    "/exposé",
    "/expos%c3%a9",
    "/angebote",
    "/immobilien/",
    "/objekt/",
    "/objekte",
    "/listing",
    "/for-sale",
    "/for-rent",
    "/purchase",
    "/rental",
    "/offer/",
    "/offers",
];

fn listing_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:kaufpreis|kaltmiete|warmmiete|nettokaltmiete|objekt-?nr|objektnummer|wohnfläche|grundstücksfläche|käuferprovision|maklercourtage|hausgeld)\b",
        )
        .expect("listing field pattern is valid")
    })
}

fn listing_keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:kaufen|mieten|miete|verkauf|vermietung|immobilie|immobilien|wohnung|einfamilienhaus|zimmer|exposé|expose|for sale|for rent|apartment)\b",
        )
        .expect("listing keyword pattern is valid")
    })
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:[€$]\s?\d[\d.,]*|\d[\d.,]*\s?(?:€|eur\b|euro\b))")
            .expect("price pattern is valid")
    })
}

/// Returns the forbidden segment a URL contains, if any
pub fn forbidden_segment(url: &str) -> Option<&'static str> {
    let lowered = url.to_lowercase();
    FORBIDDEN_URL_SEGMENTS
        .iter()
        .copied()
        .find(|segment| lowered.contains(segment))
}

/// Checks page text for listing content
///
/// Returns the violation reason and the text that triggered it. A strong listing field label
/// is enough on its own; a weaker keyword needs a price amount in the same text.
pub fn listing_content(text: &str) -> Option<(&'static str, String)> {
    if let Some(m) = listing_field_pattern().find(text) {
        return Some((REASON_LISTING_FIELD, m.as_str().to_string()));
    }

    let keyword = listing_keyword_pattern().find(text)?;
    let price = price_pattern().find(text)?;
    Some((
        REASON_KEYWORD_WITH_PRICE,
        format!("{} / {}", keyword.as_str(), price.as_str().trim()),
    ))
}
