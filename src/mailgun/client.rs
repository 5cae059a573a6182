// src/mailgun/client.rs
// =============================================================================
// This module talks to the Mailgun API.
//
// Endpoints used:
// - {endpoint}/{domain}/events?event=stored&to={email}   (the "inbox")
// - a stored message's storage URL                        (one email)
// - the same storage URL with Accept: message/rfc2822     (raw MIME)
//
// Every call uses HTTP basic auth with user "api" and the API key.
//
// Steps depend on the `Mailbox` trait rather than on this client so they can
// be exercised against an in-memory inbox.
// =============================================================================

use crate::config::MailgunConfig;
use crate::error::{Error, Result};
use crate::mailgun::models::{Email, Inbox};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const MESSAGE_NOT_FOUND: &str = "Message not found";

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// The sending domain the credential belongs to
    fn domain(&self) -> &str;

    /// Stored messages for one recipient; None when the provider returned nothing
    async fn get_inbox(&self, email: &str) -> Result<Option<Inbox>>;

    /// One stored message; None when the provider no longer has it
    async fn get_email_by_storage_url(&self, storage_url: &str) -> Result<Option<Email>>;

    /// The raw MIME source of a stored message
    async fn get_raw_mime_message(&self, storage_url: &str) -> Result<String>;
}

// Turns the provider's terse auth errors into something a scenario author
// can act on
pub fn friendly_provider_message(message: &str) -> String {
    match message {
        "Invalid private keys" => "Auth error: Invalid private key".to_string(),
        "Unknown domain" => "Auth error: Unknown domain".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct MailgunClient {
    client: Client,
    config: MailgunConfig,
}

impl MailgunClient {
    pub fn new(config: MailgunConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, config })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/{}/events",
            self.config.endpoint.trim_end_matches('/'),
            self.config.domain
        )
    }

    async fn get_text(&self, url: &str, accept: Option<&str>) -> Result<String> {
        let mut request = self
            .client
            .get(url)
            .basic_auth("api", Some(&self.config.api_key));
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = request.send().await?;
        debug!(url, status = response.status().as_u16(), "mailgun response");
        // Error bodies are JSON with a `message` too, so the status is not
        // checked here; decoding decides
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Mailbox for MailgunClient {
    fn domain(&self) -> &str {
        &self.config.domain
    }

    async fn get_inbox(&self, email: &str) -> Result<Option<Inbox>> {
        let url = reqwest::Url::parse_with_params(
            &self.events_url(),
            &[("event", "stored"), ("to", email)],
        )
        .map_err(|e| Error::Config(format!("invalid endpoint: {}", e)))?;

        let body = self.get_text(url.as_str(), None).await?;
        let inbox: Option<Inbox> = serde_json::from_str(&body)?;

        Ok(inbox.map(|mut inbox| {
            inbox.message = inbox.message.as_deref().map(friendly_provider_message);
            inbox
        }))
    }

    async fn get_email_by_storage_url(&self, storage_url: &str) -> Result<Option<Email>> {
        let body = self.get_text(storage_url, None).await?;
        let email: Option<Email> = serde_json::from_str(&body)?;

        Ok(email.and_then(|mut email| {
            let message = email.message().map(str::to_string);
            match message.as_deref() {
                Some(MESSAGE_NOT_FOUND) => None,
                Some(message) => {
                    email.set_message(friendly_provider_message(message));
                    Some(email)
                }
                None => Some(email),
            }
        }))
    }

    async fn get_raw_mime_message(&self, storage_url: &str) -> Result<String> {
        let body = self.get_text(storage_url, Some("message/rfc2822")).await?;
        let value: Value = serde_json::from_str(&body)?;

        match value.get("body-mime").and_then(Value::as_str) {
            Some(mime) => Ok(mime.to_string()),
            None => Err(Error::Provider(
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(friendly_provider_message)
                    .unwrap_or_else(|| "raw message has no body-mime".to_string()),
            )),
        }
    }
}
