// src/extractors/content.rs
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::storage::StoredFiling;
use crate::utils::error::ExtractError;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile WHITESPACE_RE"));

/// Reads a stored submission and returns its body as plain text.
pub fn read_filing_content(filing: &StoredFiling) -> Result<String, ExtractError> {
    let bytes = std::fs::read(&filing.path).map_err(|source| ExtractError::Read {
        path: filing.path.display().to_string(),
        source,
    })?;

    let text = clean_filing_text(&String::from_utf8_lossy(&bytes));
    if text.is_empty() {
        return Err(ExtractError::EmptyContent(filing.path.display().to_string()));
    }
    Ok(text)
}

/// Drops the SEC header, strips markup and collapses whitespace.
pub fn clean_filing_text(raw: &str) -> String {
    let body = match raw.find("</SEC-HEADER>") {
        Some(end) => &raw[end + "</SEC-HEADER>".len()..],
        None => raw.find("<DOCUMENT>").map_or(raw, |start| &raw[start..]),
    };

    let fragment = Html::parse_fragment(body);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");

    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
