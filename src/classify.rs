//! Transcript classification.
//!
//! The routing keyword (the "magic word") is the first whitespace-delimited
//! token of a transcript, stripped of surrounding punctuation and lowercased.
//! Stripping the keyword from the payload only happens when it matched an
//! explicitly configured rule; otherwise the leading word is ordinary content.

use thiserror::Error;

/// Punctuation trimmed from the edges of the leading token before lookup.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '"', '\'',
];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("transcript is empty, nothing to classify")]
    EmptyTranscript,
}

/// Extract the normalized routing keyword from a transcript.
///
/// Returns `EmptyTranscript` when the text contains no token at all. A token
/// that normalizes to the empty string (pure punctuation) is returned as-is;
/// it simply resolves to the default rule downstream.
pub fn extract_keyword(text: &str) -> Result<String, ClassifyError> {
    let token = text
        .split_whitespace()
        .next()
        .ok_or(ClassifyError::EmptyTranscript)?;

    Ok(token.trim_matches(EDGE_PUNCTUATION).to_lowercase())
}

/// Remove the leading keyword token and surrounding whitespace from `text`.
///
/// `matched` carries the configured keyword the first token resolved to, or
/// `None` when the lookup fell through to the default rule. In the default
/// case the text passes through unmodified.
pub fn strip_keyword<'a>(text: &'a str, matched: Option<&str>) -> &'a str {
    if matched.is_none() {
        return text;
    }

    let trimmed = text.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(end) => trimmed[end..].trim_start(),
        None => "",
    }
}
