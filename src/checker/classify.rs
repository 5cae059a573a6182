// src/checker/classify.rs
// =============================================================================
// This module decides what a single fetch result means.
//
// The rules are ordered, first match wins:
// 1. 2xx                       -> working (and maybe a script redirect to chase);
//                                 broken when its redirect script is unreadable
// 2. status in pass-on codes   -> working, status kept as-is
// 3. 302 that survived         -> script redirect, empty-redirect 404, or broken
// 4. 999                       -> working (bot wall on a live page)
// 5. anything else             -> broken
//
// Nothing here touches the network, so every rule is unit tested directly.
// =============================================================================

use crate::checker::candidate::{CandidateUrl, UrlType};
use crate::checker::fetch::{FetchError, FetchResponse};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

pub const NO_RESPONSE: &str = "No response received";
pub const EMPTY_REDIRECT: &str = "The redirect url is empty";

static SCRIPT_REDIRECT_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var redirecturl = '([^']*)'").expect("valid regex"));

// The two terminal buckets a URL can land in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Working,
    Broken,
}

// Result record for one evaluated URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheckResult {
    pub url: String,
    pub final_url: String,
    /// Numeric code as text, or "No response received"
    pub status_code: String,
    pub message: String,
    #[serde(rename = "type")]
    pub url_type: UrlType,
    pub order: usize,
    pub status: LinkStatus,
}

impl LinkCheckResult {
    pub fn is_ok(&self) -> bool {
        self.status == LinkStatus::Working
    }

    fn working(candidate: &CandidateUrl, final_url: String, status_code: String) -> Self {
        Self {
            url: candidate.url.clone(),
            final_url,
            message: format!("Status code: {}", status_code),
            status_code,
            url_type: candidate.url_type,
            order: candidate.order,
            status: LinkStatus::Working,
        }
    }

    fn broken(candidate: &CandidateUrl, final_url: String, status_code: String, message: String) -> Self {
        Self {
            url: candidate.url.clone(),
            final_url,
            status_code,
            message,
            url_type: candidate.url_type,
            order: candidate.order,
            status: LinkStatus::Broken,
        }
    }

    // Used when checking a URL blew up before a result could be built
    pub fn no_response(candidate: &CandidateUrl) -> Self {
        Self::broken(
            candidate,
            candidate.url.clone(),
            NO_RESPONSE.to_string(),
            NO_RESPONSE.to_string(),
        )
    }
}

// Status codes the caller wants treated as fine, e.g. "403, 429"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOnCodes(HashSet<String>);

impl PassOnCodes {
    pub fn parse(codes: &str) -> Self {
        Self(
            codes
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// What the classifier decided for one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Terminal result; None only when a redirect candidate supersedes it
    pub outcome: Option<LinkCheckResult>,
    /// A further hop found inside a redirect script
    pub redirect: Option<CandidateUrl>,
}

impl Classification {
    fn terminal(outcome: LinkCheckResult) -> Self {
        Self {
            outcome: Some(outcome),
            redirect: None,
        }
    }
}

/// What a response body says about a marketing-platform redirect page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRedirect {
    /// No redirect script in the body
    Absent,
    /// The quoted target of the script
    Target(String),
    /// The script is there but its target could not be read
    Unreadable,
}

/// Pulls the target out of a marketing-platform redirect page.
///
/// Those pages answer with a tiny script instead of a Location header:
///
/// ```text
/// var redirecturl = 'https://next.hop/';
/// function redirect() { window.self.location = redirecturl; }
/// ```
///
/// All three markers must be present for the body to count as such a page.
/// A single-quoted, non-empty target is returned as `Target` (`mailto:`
/// included; callers decide what to do with it). Any other shape, such as
/// a double-quoted or empty target, is `Unreadable`.
pub fn extract_script_redirect(body: &str) -> ScriptRedirect {
    let has_markers = body.contains("var redirecturl")
        && body.contains("window.self.location = redirecturl")
        && body.contains("function redirect() {");
    if !has_markers {
        return ScriptRedirect::Absent;
    }

    let target = SCRIPT_REDIRECT_TARGET
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    match target {
        Some(target) if !target.is_empty() => ScriptRedirect::Target(target.to_string()),
        _ => ScriptRedirect::Unreadable,
    }
}

fn is_mailto(target: &str) -> bool {
    target.contains("mailto:")
}

// Redirect candidates are always treated as HTML and sort next to the URL
// whose response revealed them
fn redirect_candidate(parent: &CandidateUrl, target: String) -> CandidateUrl {
    CandidateUrl::new(target, UrlType::Html, parent.order)
}

/// Classifies one fetch result.
///
/// `extract_redirects` is false on the second round, which caps script
/// redirects at a single extra hop.
pub fn classify(
    candidate: &CandidateUrl,
    result: &Result<FetchResponse, FetchError>,
    pass_on_codes: &PassOnCodes,
    extract_redirects: bool,
) -> Classification {
    let response = match result {
        Ok(response) => {
            let redirect = match extract_script_redirect(&response.body) {
                // A redirect page we cannot follow proves nothing about the link
                ScriptRedirect::Unreadable => {
                    return Classification::terminal(LinkCheckResult::no_response(candidate));
                }
                ScriptRedirect::Target(target) if extract_redirects && !is_mailto(&target) => {
                    Some(redirect_candidate(candidate, target))
                }
                _ => None,
            };
            return Classification {
                outcome: Some(LinkCheckResult::working(
                    candidate,
                    response.final_url.clone(),
                    "200".to_string(),
                )),
                redirect,
            };
        }
        Err(error) => error.response(),
    };

    let final_url = response
        .map(|r| r.final_url.clone())
        .unwrap_or_else(|| candidate.url.clone());

    let Some(response) = response else {
        return Classification::terminal(LinkCheckResult::broken(
            candidate,
            final_url,
            NO_RESPONSE.to_string(),
            NO_RESPONSE.to_string(),
        ));
    };

    let status = response.status;

    if pass_on_codes.contains(status) {
        return Classification::terminal(LinkCheckResult::working(
            candidate,
            final_url,
            status.to_string(),
        ));
    }

    if status == 302 {
        if extract_redirects {
            if let ScriptRedirect::Target(target) = extract_script_redirect(&response.body) {
                if !is_mailto(&target) {
                    // The script hop replaces this URL's own result
                    return Classification {
                        outcome: None,
                        redirect: Some(redirect_candidate(candidate, target)),
                    };
                }
            }
        }

        if response.body.contains("404 Not Found") && response.body.contains(EMPTY_REDIRECT) {
            return Classification::terminal(LinkCheckResult::broken(
                candidate,
                final_url,
                "404".to_string(),
                EMPTY_REDIRECT.to_string(),
            ));
        }
    }

    if status == 999 {
        return Classification::terminal(LinkCheckResult::working(
            candidate,
            final_url,
            "999".to_string(),
        ));
    }

    Classification::terminal(LinkCheckResult::broken(
        candidate,
        final_url,
        status.to_string(),
        format!("Status code: {}", status),
    ))
}
