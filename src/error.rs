// src/error.rs
// =============================================================================
// Crate-wide error type.
//
// Per-URL failures never show up here: the link evaluator turns them into
// Broken results. These errors are for the things a step cannot recover from
// (provider unreachable, bad JSON, bad configuration) and end up in an
// error verdict.
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Provider(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
