// src/config.rs
// =============================================================================
// Runtime configuration.
//
// - MailgunConfig: the single static credential the cog authenticates with
//   (API key, sending domain, API endpoint)
// - CheckerConfig: knobs for the link checker
//
// Both are filled from CLI flags / environment variables in cli.rs.
// =============================================================================

use crate::checker::{FetchOptions, DEFAULT_CONCURRENCY};
use crate::error::{Error, Result};
use serde::Serialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.mailgun.net/v3";

#[derive(Debug, Clone)]
pub struct MailgunConfig {
    pub api_key: String,
    pub domain: String,
    pub endpoint: String,
}

impl MailgunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("apiKey is required".to_string()));
        }
        if self.domain.trim().is_empty() {
            return Err(Error::Config("domain is required".to_string()));
        }
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        Ok(())
    }

    // Never log the key itself
    pub fn redacted(&self) -> String {
        format!(
            "domain={} endpoint={} api_key=***{}",
            self.domain,
            self.endpoint,
            self.api_key
                .chars()
                .rev()
                .take(4)
                .collect::<String>()
                .chars()
                .rev()
                .collect::<String>()
        )
    }
}

// An authentication field the host has to collect for this cog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthField {
    pub field: &'static str,
    pub description: &'static str,
}

pub const EXPECTED_AUTH_FIELDS: &[AuthField] = &[
    AuthField {
        field: "apiKey",
        description: "Mailgun API Key",
    },
    AuthField {
        field: "domain",
        description: "Email Domain",
    },
    AuthField {
        field: "endpoint",
        description: "Mailgun API Endpoint",
    },
];

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub max_redirects: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: fetch.timeout_ms,
            max_redirects: fetch.max_redirects,
        }
    }
}

impl CheckerConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout_ms: self.timeout_ms,
            max_redirects: self.max_redirects,
            ..FetchOptions::default()
        }
    }
}
