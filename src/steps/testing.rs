// src/steps/testing.rs
// =============================================================================
// In-memory stand-ins for Mailgun and the network, shared by step tests.
// The network side is the checker's StaticFetcher.
// =============================================================================

use crate::checker::Evaluator;
use crate::error::{Error, Result};
use crate::mailgun::{Email, Inbox, InboxItem, Mailbox, MessageHeaders, Storage, StoredMessage};
use crate::steps::StepContext;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub use crate::checker::testing::StaticFetcher;

pub const DOMAIN: &str = "mg.test";

#[derive(Default)]
pub struct StubMailbox {
    pub inbox: Option<Inbox>,
    pub emails: HashMap<String, Email>,
    pub raw: String,
    pub fail_with: Option<String>,
}

impl StubMailbox {
    // An inbox holding the given messages, listed oldest first; each
    // message is (subject, stored fields)
    pub fn with_messages(messages: Vec<(&str, Value)>) -> Self {
        let mut items = Vec::new();
        let mut emails = HashMap::new();
        for (subject, fields) in messages {
            let url = format!("https://storage.test/{}", subject);
            items.push(InboxItem {
                message: StoredMessage {
                    headers: MessageHeaders {
                        subject: subject.to_string(),
                        from: "sender@example.com".to_string(),
                        to: format!("user@{}", DOMAIN),
                    },
                },
                storage: Storage { url: url.clone() },
            });
            let fields: Map<String, Value> = fields.as_object().cloned().unwrap_or_default();
            emails.insert(url, Email::new(fields));
        }
        // Provider lists newest first
        items.reverse();

        Self {
            inbox: Some(Inbox {
                items,
                message: None,
            }),
            emails,
            raw: "From: sender@example.com\r\nSubject: raw\r\n\r\nbody".to_string(),
            fail_with: None,
        }
    }
}

#[async_trait]
impl Mailbox for StubMailbox {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn get_inbox(&self, _email: &str) -> Result<Option<Inbox>> {
        if let Some(message) = &self.fail_with {
            return Err(Error::Provider(message.clone()));
        }
        Ok(self.inbox.clone())
    }

    async fn get_email_by_storage_url(&self, storage_url: &str) -> Result<Option<Email>> {
        Ok(self.emails.get(storage_url).cloned())
    }

    async fn get_raw_mime_message(&self, _storage_url: &str) -> Result<String> {
        Ok(self.raw.clone())
    }
}

pub fn context(mailbox: StubMailbox, fetcher: StaticFetcher) -> StepContext {
    StepContext {
        mailbox: Arc::new(mailbox),
        evaluator: Evaluator::new(Arc::new(fetcher)),
    }
}
