// src/mailgun/mod.rs
// =============================================================================
// This module handles reading inboxes and stored messages from Mailgun.
//
// - client: the HTTP client and the `Mailbox` trait steps depend on
// - models: inbox and email payloads
// =============================================================================

mod client;
mod models;

pub use client::{friendly_provider_message, Mailbox, MailgunClient};
pub use models::{Email, Inbox, InboxItem, MessageHeaders, Storage, StoredMessage};
