// src/mailgun/models.rs
// =============================================================================
// Shapes of the Mailgun payloads we read.
//
// Only the fields the steps use are typed; everything else is ignored on the
// inbox side and kept verbatim on the email side (the field step can check
// any top-level field of a stored message).
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Response of the events API filtered to stored messages for one recipient
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    #[serde(default)]
    pub items: Vec<InboxItem>,
    /// Set by the provider instead of `items` when something went wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Inbox {
    // Items oldest first; the provider lists newest first
    pub fn received_in_order(&self) -> Vec<&InboxItem> {
        self.items.iter().rev().collect()
    }

    // The nth message received (1-based), oldest first
    pub fn nth_received(&self, position: usize) -> Option<&InboxItem> {
        position
            .checked_sub(1)
            .and_then(|index| self.received_in_order().get(index).copied())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    #[serde(default)]
    pub message: StoredMessage,
    pub storage: Storage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub headers: MessageHeaders,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub url: String,
}

// A stored message as returned by its storage URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(Map<String, Value>);

impl Email {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    // A top-level field as text; numbers and booleans are rendered, null is absent
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn body_html(&self) -> String {
        self.field("body-html").unwrap_or_default()
    }

    pub fn body_plain(&self) -> String {
        self.field("body-plain").unwrap_or_default()
    }

    pub(crate) fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.0.insert("message".to_string(), Value::String(message));
    }
}
