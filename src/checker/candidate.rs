// src/checker/candidate.rs
// =============================================================================
// The URLs we are asked to check.
//
// Every candidate remembers where it came from (HTML markup or the plain-text
// body) and the position it was first seen at, so results can be shown in the
// same order as the email.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// Where a URL was found in the email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlType {
    /// Found in the HTML body (anchor href, image src, or a redirect script)
    #[serde(rename = "HTML")]
    Html,
    /// Found by scanning the plain-text body
    #[serde(rename = "Plain")]
    Plain,
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlType::Html => write!(f, "HTML"),
            UrlType::Plain => write!(f, "Plain"),
        }
    }
}

// A URL queued for reachability evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUrl {
    pub url: String,
    #[serde(rename = "type")]
    pub url_type: UrlType,
    /// First-seen position in the source document (1-based)
    pub order: usize,
}

impl CandidateUrl {
    pub fn new(url: impl Into<String>, url_type: UrlType, order: usize) -> Self {
        Self {
            url: url.into(),
            url_type,
            order,
        }
    }
}

// Drops exact duplicates so each (url, type) pair is fetched once.
//
// The first occurrence wins, which keeps its `order`. The same URL found in
// both HTML and plain text stays twice because the types differ.
pub fn dedup_candidates(candidates: Vec<CandidateUrl>) -> Vec<CandidateUrl> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.url.clone(), c.url_type)))
        .collect()
}
