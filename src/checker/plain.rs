// src/checker/plain.rs
// =============================================================================
// This module finds URLs in the plain-text part of an email.
//
// Plain-text bodies have no markup, so we scan for anything that looks like
// an http(s) URL and trim the punctuation that usually trails a URL in prose
// ("see https://example.com/docs." -> "https://example.com/docs").
// =============================================================================

use crate::checker::html::is_checkable_link;
use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`{}|\\^\[\]]+"#).expect("valid regex"));

// Extracts http(s) URLs from plain text, in the order they appear
//
// Duplicates are kept; the evaluator deduplicates.
pub fn extract_plain_links(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()))
        .filter(|url| is_checkable_link(url))
        .map(str::to_string)
        .collect()
}

// Strips sentence punctuation and unbalanced closing brackets off the end
fn trim_trailing_punctuation(url: &str) -> &str {
    let mut trimmed = url;
    loop {
        let Some(last) = trimmed.chars().last() else {
            return trimmed;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '*' => true,
            ')' => trimmed.matches('(').count() < trimmed.matches(')').count(),
            _ => false,
        };
        if !strip {
            return trimmed;
        }
        trimmed = &trimmed[..trimmed.len() - last.len_utf8()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_links() {
        let text = "Hi!\nRead https://example.com/docs. Or (https://example.com/faq).\n\
                    Unsubscribe: <https://example.com/unsub?id=1>";
        assert_eq!(
            extract_plain_links(text),
            vec![
                "https://example.com/docs",
                "https://example.com/faq",
                "https://example.com/unsub?id=1",
            ]
        );
    }

    #[test]
    fn test_balanced_parens_are_kept() {
        let text = "https://en.wikipedia.org/wiki/Rust_(programming_language)";
        assert_eq!(extract_plain_links(text), vec![text]);
    }

    #[test]
    fn test_no_links() {
        assert!(extract_plain_links("call us at tel:+15551234 or mailto:a@b.test").is_empty());
    }
}
