// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - candidate: the URLs to check and where they came from
// - fetch: makes the HTTP request for one URL
// - classify: decides working / broken / follow-the-script for one result
// - evaluate: runs the two rounds over a batch of URLs
// - html, plain: pull URLs out of email bodies
// =============================================================================

mod candidate;
mod classify;
mod evaluate;
mod fetch;
mod html;
mod plain;

#[cfg(test)]
pub(crate) mod testing;

pub use candidate::{dedup_candidates, CandidateUrl, UrlType};
pub use classify::{
    classify, extract_script_redirect, Classification, LinkCheckResult, LinkStatus, PassOnCodes,
    ScriptRedirect, NO_RESPONSE,
};
pub use evaluate::{EvaluationResult, Evaluator, DEFAULT_CONCURRENCY};
pub use fetch::{
    FetchError, FetchOptions, FetchResponse, Fetcher, HttpFetcher, TransportErrorKind,
    BARE_USER_AGENT_HOSTS, DESKTOP_USER_AGENT,
};
pub use html::{extract_anchor_links, extract_image_links};
pub use plain::extract_plain_links;
