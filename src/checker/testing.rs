// src/checker/testing.rs
// =============================================================================
// A canned-response Fetcher shared by the evaluator and step tests.
// =============================================================================

use crate::checker::fetch::{FetchError, FetchResponse, Fetcher, TransportErrorKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

// Fixed status (and body) per URL; unknown URLs get no response
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, (u16, String)>,
    panics_on: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with(self, url: &str, status: u16) -> Self {
        self.with_body(url, status, "")
    }

    pub fn with_body(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses.insert(url.to_string(), (status, body.to_string()));
        self
    }

    // Fetching this URL panics inside the fetcher
    pub fn panicking(mut self, url: &str) -> Self {
        self.panics_on.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics_on.contains(url) {
            panic!("fetcher exploded on {url}");
        }

        let Some((status, body)) = self.responses.get(url) else {
            return Err(FetchError::Transport {
                kind: TransportErrorKind::Connect,
                message: "connection refused".to_string(),
            });
        };

        let response = FetchResponse {
            status: *status,
            final_url: url.to_string(),
            body: body.clone(),
        };
        if (200..300).contains(status) {
            Ok(response)
        } else {
            Err(FetchError::Status(response))
        }
    }
}
