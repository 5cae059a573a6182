// src/lib.rs
// =============================================================================
// Mailgun cog: scenario steps that check what arrived in a Mailgun inbox.
//
// Modules:
// - checker: the link evaluator (fetch, classify, two-round evaluation)
// - mailgun: the Mailgun API client and payload models
// - steps: the steps themselves, their manifest and dispatch
// - config: credentials and checker knobs
// - error: the crate error type
// =============================================================================

pub mod checker;
pub mod config;
pub mod error;
pub mod mailgun;
pub mod steps;
