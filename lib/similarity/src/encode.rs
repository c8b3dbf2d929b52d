//! Value encoders: pure text normalizers applied before comparison or
//! blocking-key derivation.
//!
//! Be careful to combine encoders in a compatible sequence; an encoder that
//! strips everything but digits should not feed one expecting words.

use dedupx_core::Encoder;
use std::sync::Arc;

/// Collapse runs of whitespace to single spaces and trim the ends.
#[must_use]
pub fn strip(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and collapse whitespace.
#[must_use]
pub fn lowstrip(text: &str) -> String {
    strip(&text.to_lowercase())
}

/// Remove all whitespace.
#[must_use]
pub fn nospace(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Keep only digits (for phone numbers and the like).
#[must_use]
pub fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Sort the words of the text, for order-insensitive comparison.
#[must_use]
pub fn sorted_words(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

/// Reverse the text.
#[must_use]
pub fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

/// The domain of a URL; input returned unchanged when no domain is found.
#[must_use]
pub fn urldomain(text: &str) -> String {
    let trimmed = text.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    match rest.split('/').next() {
        Some(domain) if !domain.is_empty() => domain.to_string(),
        _ => text.to_string(),
    }
}

/// The domain of an e-mail address; input returned unchanged when it does
/// not look like an address.
#[must_use]
pub fn emaildomain(text: &str) -> String {
    match text.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => domain.to_string(),
        _ => text.to_string(),
    }
}

/// Look up an encoder function by name, for configuration layers.
#[must_use]
pub fn by_name(name: &str) -> Option<fn(&str) -> String> {
    Some(match name {
        "strip" => strip,
        "lowstrip" => lowstrip,
        "nospace" => nospace,
        "digits" => digits,
        "sorted_words" => sorted_words,
        "reverse" => reverse,
        "urldomain" => urldomain,
        "emaildomain" => emaildomain,
        _ => return None,
    })
}

/// Compose encoders into one [`Encoder`], applied left to right.
#[must_use]
pub fn chain(encoders: Vec<fn(&str) -> String>) -> Encoder {
    Arc::new(move |text: &str| {
        encoders
            .iter()
            .fold(text.to_string(), |value, encode| encode(&value))
    })
}
