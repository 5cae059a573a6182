// src/checker/fetch.rs
// =============================================================================
// This module performs the HTTP request for a single link.
//
// Key functionality:
// - One GET per URL (we need the body: some redirect services hide the next
//   hop inside a script)
// - Bounded redirect following; a redirect chain that is too long or loops
//   hands back its last 3xx response instead of an opaque error
// - Error responses keep their status, final URL and body
// - A short list of hosts is fetched without any User-Agent header
//
// Rust concepts:
// - Traits: `Fetcher` is the seam the evaluator talks to, so tests can swap
//   the network out for canned responses
// - Result<T, E>: a non-2xx response is an `Err` that still carries data
// =============================================================================

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Desktop browser UA sent to every host not on the bare list.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Hosts that reject requests carrying a custom User-Agent.
/// Subdomains match too (www.linkedin.com matches linkedin.com).
pub const BARE_USER_AGENT_HOSTS: &[&str] = &[
    "linkedin.com",
    "lnkd.in",
    "facebook.com",
    "instagram.com",
];

// How the adapter talks to the network
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// UA for hosts not on the bare list; None sends no UA at all
    pub user_agent: Option<String>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub timeout_ms: u64,
    pub bare_user_agent_hosts: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: Some(DESKTOP_USER_AGENT.to_string()),
            follow_redirects: true,
            max_redirects: 10,
            timeout_ms: 10_000,
            bare_user_agent_hosts: BARE_USER_AGENT_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl FetchOptions {
    // Picks the User-Agent header for a URL, or None to leave it off
    pub fn user_agent_for(&self, url: &str) -> Option<&str> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));

        if let Some(host) = host {
            let bare = self.bare_user_agent_hosts.iter().any(|listed| {
                host == *listed || host.ends_with(&format!(".{}", listed))
            });
            if bare {
                return None;
            }
        }

        self.user_agent.as_deref()
    }
}

// What came back from a server: either a 2xx (Ok) or the failing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// URL after the last followed redirect
    pub final_url: String,
    pub body: String,
}

// Why a transport-level failure happened (no HTTP response at all)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    TooManyRedirects,
    Dns,
    Connect,
    Tls,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransportErrorKind::Timeout => "request timed out",
            TransportErrorKind::TooManyRedirects => "too many redirects",
            TransportErrorKind::Dns => "could not resolve hostname",
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Tls => "TLS error",
            TransportErrorKind::Other => "request failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status
    #[error("Status code: {}", .0.status)]
    Status(FetchResponse),
    /// No response was received
    #[error("{kind}: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
}

impl FetchError {
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchError::Status(response) => Some(response),
            FetchError::Transport { .. } => None,
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

// The real network-backed fetcher
//
// One reqwest client is built per evaluation and reused for every URL
// (connection pooling). It has no cookie store.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .redirect(redirect_policy(&options))
            .build()?;

        Ok(Self { client, options })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some(user_agent) = self.options.user_agent_for(url) {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await.map_err(categorize_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        // A body we cannot read is treated as empty; the status still counts
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(url, error = %e, "could not read response body");
                String::new()
            }
        };

        let fetched = FetchResponse {
            status: status.as_u16(),
            final_url,
            body,
        };

        if status.is_success() {
            Ok(fetched)
        } else {
            Err(FetchError::Status(fetched))
        }
    }
}

// Follows up to `max_redirects` hops. When the budget runs out, or a hop
// points back at a URL already visited, the last 3xx response is returned
// as-is so the classifier can look at its body.
fn redirect_policy(options: &FetchOptions) -> Policy {
    if !options.follow_redirects {
        return Policy::none();
    }

    let max = options.max_redirects;
    Policy::custom(move |attempt| {
        let looped = attempt.previous().iter().any(|u| u == attempt.url());
        if looped || attempt.previous().len() > max {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

// Sorts reqwest errors into a handful of kinds for logging
fn categorize_error(error: reqwest::Error) -> FetchError {
    let error_string = error.to_string();
    let lowered = error_string.to_ascii_lowercase();

    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_redirect() {
        TransportErrorKind::TooManyRedirects
    } else if error.is_connect() {
        if lowered.contains("dns") {
            TransportErrorKind::Dns
        } else {
            TransportErrorKind::Connect
        }
    } else if lowered.contains("certificate") || lowered.contains("ssl") || lowered.contains("tls") {
        TransportErrorKind::Tls
    } else {
        TransportErrorKind::Other
    };

    FetchError::Transport {
        kind,
        message: error_string,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, HeaderMap, StatusCode},
        routing::get,
        Router,
    };
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn echo_user_agent_app() -> Router {
        Router::new().route(
            "/ua",
            get(|headers: HeaderMap| async move {
                headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string()
            }),
        )
    }

    #[test]
    fn test_user_agent_for_bare_hosts_and_subdomains() {
        let options = FetchOptions::default();
        assert_eq!(options.user_agent_for("https://www.linkedin.com/in/someone"), None);
        assert_eq!(options.user_agent_for("https://lnkd.in/abc"), None);
        assert_eq!(
            options.user_agent_for("https://example.com/"),
            Some(DESKTOP_USER_AGENT)
        );
        // Suffix match must be on a label boundary
        assert_eq!(
            options.user_agent_for("https://notlinkedin.com/"),
            Some(DESKTOP_USER_AGENT)
        );
    }

    #[tokio::test]
    async fn test_success_returns_body_and_final_url() {
        let app = Router::new().route("/ok", get(|| async { "hello" }));
        let addr = serve(app).await;

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let url = format!("http://{}/ok", addr);
        let response = fetcher.fetch(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.final_url, url);
        assert_eq!(response.body, "hello");
    }

    #[tokio::test]
    async fn test_follows_redirects_and_reports_final_url() {
        let app = Router::new()
            .route(
                "/start",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/end")], "") }),
            )
            .route("/end", get(|| async { "landed" }));
        let addr = serve(app).await;

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let response = fetcher.fetch(&format!("http://{}/start", addr)).await.unwrap();

        assert_eq!(response.final_url, format!("http://{}/end", addr));
        assert_eq!(response.body, "landed");
    }

    #[tokio::test]
    async fn test_redirect_loop_surfaces_last_302_with_body() {
        let app = Router::new().route(
            "/loop",
            get(|| async {
                (
                    StatusCode::FOUND,
                    [(header::LOCATION, "/loop")],
                    "404 Not Found. The redirect url is empty",
                )
            }),
        );
        let addr = serve(app).await;

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/loop", addr))
            .await
            .unwrap_err();

        let response = err.response().expect("302 response kept");
        assert_eq!(response.status, 302);
        assert!(response.body.contains("The redirect url is empty"));
    }

    #[tokio::test]
    async fn test_redirect_budget_exhausted_surfaces_302() {
        let app = Router::new()
            .route(
                "/a",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/b")], "") }),
            )
            .route(
                "/b",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/c")], "at b") }),
            )
            .route("/c", get(|| async { "unreachable with one hop" }));
        let addr = serve(app).await;

        let options = FetchOptions {
            max_redirects: 1,
            ..FetchOptions::default()
        };
        let fetcher = HttpFetcher::new(options).unwrap();
        let err = fetcher.fetch(&format!("http://{}/a", addr)).await.unwrap_err();

        let response = err.response().unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.final_url, format!("http://{}/b", addr));
        assert_eq!(response.body, "at b");
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let app = Router::new().route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "nothing here") }),
        );
        let addr = serve(app).await;

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/missing", addr))
            .await
            .unwrap_err();

        match err {
            FetchError::Status(response) => {
                assert_eq!(response.status, 404);
                assert_eq!(response.body, "nothing here");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_desktop_user_agent_is_sent() {
        let addr = serve(echo_user_agent_app()).await;

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let response = fetcher.fetch(&format!("http://{}/ua", addr)).await.unwrap();
        assert_eq!(response.body, DESKTOP_USER_AGENT);
    }

    #[tokio::test]
    async fn test_bare_host_gets_no_user_agent() {
        let addr = serve(echo_user_agent_app()).await;

        let options = FetchOptions {
            bare_user_agent_hosts: vec!["127.0.0.1".to_string()],
            ..FetchOptions::default()
        };
        let fetcher = HttpFetcher::new(options).unwrap();
        let response = fetcher.fetch(&format!("http://{}/ua", addr)).await.unwrap();
        assert_eq!(response.body, "none");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let err = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap_err();
        assert!(err.response().is_none());
    }
}
