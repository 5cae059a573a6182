// src/checker/html.rs
// =============================================================================
// This module pulls checkable URLs out of an email's HTML body.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is forgiving about the broken markup email builders produce
//
// Emails have no base URL, so relative links cannot be resolved and are
// skipped. Only absolute http(s) URLs are returned, in document order.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

// Extracts every <a href> pointing at an http(s) URL
//
// Example:
//   html = "<a href='https://example.com/docs'>Docs</a><a href='mailto:x@y'>"
//   result = ["https://example.com/docs"]
pub fn extract_anchor_links(html: &str) -> Vec<String> {
    // Constant selector, known to be valid
    let selector = Selector::parse("a[href]").expect("valid selector");
    extract_attribute(html, &selector, "href")
}

// Extracts every <img src> pointing at an http(s) URL
pub fn extract_image_links(html: &str) -> Vec<String> {
    let selector = Selector::parse("img[src]").expect("valid selector");
    extract_attribute(html, &selector, "src")
}

fn extract_attribute(html: &str, selector: &Selector, attribute: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|element| element.value().attr(attribute))
        .map(str::trim)
        .filter(|value| is_checkable_link(value))
        .map(str::to_string)
        .collect()
}

// Checks if a URL should be checked
//
// We skip mailto:, tel:, javascript:, data:, anchors and relative paths.
// The raw attribute value is kept (not re-serialized by the url crate) so
// the evidence table shows exactly what the email contained.
pub(crate) fn is_checkable_link(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && Url::parse(url).is_ok()
}
