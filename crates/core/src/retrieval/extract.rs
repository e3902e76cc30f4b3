//! Heuristic field extraction from unstructured page text.
//!
//! Each field is an ordered list of independent matchers. The first matcher
//! whose capture passes the field's acceptance check wins; later matchers are
//! only consulted when earlier ones find nothing acceptable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::travel::PriceRange;

pub const DESCRIPTION_LIMIT: usize = 400;
pub const DESCRIPTION_UNAVAILABLE: &str = "Description not available";

static RATING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(\d+(?:\.\d+)?)\s*(?:out of|/)\s*5",
        r"(?i)(\d+(?:\.\d+)?)\s*stars?",
        r"(?i)rating[:\s]*(\d+(?:\.\d+)?)",
    ])
});

static DOLLAR_RUN: Lazy<Regex> = Lazy::new(|| compile_one(r"\$+"));

static PRICE_WORD: Lazy<Regex> =
    Lazy::new(|| compile_one(r"(?i)\b(luxury|budget|cheap|affordable|expensive|premium)\b"));

static ADDRESS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)address[:\s]+([^,\n]+(?:,\s*[^,\n]+)*)",
        r"(?i)located at[:\s]+([^,\n]+)",
        r"(?i)(\d+\s+[A-Za-z\s]+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd)\b[^,\n]*)",
    ])
});

static HOURS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)hours?[:\s]+([^,\n]+)",
        r"(?i)\bopen[:\s]+([^,\n]+)",
        r"(?i)(\d{1,2}:\d{2}\s*(?:AM|PM)\s*-\s*\d{1,2}:\d{2}\s*(?:AM|PM))",
    ])
});

static CONTACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\bphone\b[:\s]+([+\d\s\-()]+)",
        r"(?i)\btel\b[:\s]+([+\d\s\-()]+)",
        r"(\+\d{1,3}\s*\d{3,4}\s*\d{3,4}\s*\d{3,4})",
    ])
});

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| compile_one(r"[.!?]+"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|pattern| compile_one(pattern)).collect()
}

fn compile_one(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static extraction pattern must compile")
}

/// First capture of the first pattern whose capture passes `accept`.
fn first_accepted<T>(
    patterns: &[Regex],
    text: &str,
    accept: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|capture| accept(capture.as_str().trim()))
    })
}

pub fn extract_rating(text: &str) -> Option<f32> {
    first_accepted(&RATING_PATTERNS, text, |raw| {
        raw.parse::<f32>().ok().filter(|value| (0.0..=5.0).contains(value))
    })
}

pub fn extract_price_range(text: &str) -> Option<PriceRange> {
    if let Some(run) = DOLLAR_RUN.find(text) {
        return Some(match run.as_str().len() {
            1 => PriceRange::Budget,
            2 => PriceRange::Moderate,
            _ => PriceRange::Expensive,
        });
    }

    PRICE_WORD.find(text).map(|word| match word.as_str().to_ascii_lowercase().as_str() {
        "luxury" => PriceRange::Luxury,
        "budget" => PriceRange::Budget,
        other => PriceRange::Raw(other.to_string()),
    })
}

pub fn extract_address(text: &str) -> Option<String> {
    first_accepted(&ADDRESS_PATTERNS, text, |raw| {
        let length = raw.chars().count();
        (length > 10 && length < 200).then(|| raw.to_string())
    })
}

pub fn extract_hours(text: &str) -> Option<String> {
    first_accepted(&HOURS_PATTERNS, text, |raw| {
        (!raw.is_empty() && raw.chars().count() < 100).then(|| raw.to_string())
    })
}

pub fn extract_contact(text: &str) -> Option<String> {
    first_accepted(&CONTACT_PATTERNS, text, |raw| {
        let digits = raw.chars().filter(char::is_ascii_digit).count();
        (digits >= 7).then(|| raw.to_string())
    })
}

/// Highlights when present, otherwise the first few clean sentences of the
/// page text.
pub fn build_description(highlights: &[String], text: &str) -> String {
    let joined = highlights
        .iter()
        .map(|highlight| highlight.trim())
        .filter(|highlight| !highlight.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.is_empty() {
        return truncate_chars(&joined, DESCRIPTION_LIMIT);
    }

    let sentences = SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|sentence| {
            let length = sentence.chars().count();
            length > 30 && length < 200
        })
        .filter(|sentence| {
            let lowered = sentence.to_lowercase();
            !lowered.contains("cookie") && !lowered.contains("privacy")
        })
        .take(3)
        .collect::<Vec<_>>();

    if sentences.is_empty() {
        return DESCRIPTION_UNAVAILABLE.to_string();
    }
    truncate_chars(&sentences.join(". "), DESCRIPTION_LIMIT)
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}
