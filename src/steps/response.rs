// src/steps/response.rs
// =============================================================================
// What a step hands back to the host.
//
// A response has one of three outcomes (passed / failed / error), a printf
// style message with positional arguments, and any number of evidence
// records: tables, binary attachments and key-value maps.
// =============================================================================

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStepResponse {
    pub outcome: Outcome,
    pub message_format: String,
    pub message_args: Vec<Value>,
    pub records: Vec<StepRecord>,
}

impl RunStepResponse {
    fn new(outcome: Outcome, format: &str, args: Vec<Value>) -> Self {
        Self {
            outcome,
            message_format: format.to_string(),
            message_args: args,
            records: Vec::new(),
        }
    }

    pub fn pass(format: &str, args: Vec<Value>) -> Self {
        Self::new(Outcome::Passed, format, args)
    }

    pub fn fail(format: &str, args: Vec<Value>) -> Self {
        Self::new(Outcome::Failed, format, args)
    }

    pub fn error(format: &str, args: Vec<Value>) -> Self {
        Self::new(Outcome::Error, format, args)
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = StepRecord>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn record(&self, id: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// The message with `%s` / `%d` placeholders filled in, for display.
    pub fn rendered_message(&self) -> String {
        let mut out = String::with_capacity(self.message_format.len());
        let mut args = self.message_args.iter();
        let mut chars = self.message_format.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '%' && matches!(chars.peek(), Some('s') | Some('d')) {
                chars.next();
                match args.next() {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => out.push_str("%s"),
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

// One column of a table record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordValue {
    Table {
        headers: Vec<TableColumn>,
        rows: Vec<Map<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    Binary {
        mime_type: String,
        /// base64 encoded
        data: String,
    },
    KeyValue {
        fields: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub name: String,
    pub value: RecordValue,
}

impl StepRecord {
    // `headers` is (key, label) in display order
    pub fn table(id: &str, name: &str, headers: &[(&str, &str)], rows: Vec<Map<String, Value>>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value: RecordValue::Table {
                headers: headers
                    .iter()
                    .map(|(key, label)| TableColumn {
                        key: key.to_string(),
                        label: label.to_string(),
                    })
                    .collect(),
                rows,
            },
        }
    }

    pub fn binary(id: &str, name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value: RecordValue::Binary {
                mime_type: mime_type.to_string(),
                data: STANDARD.encode(bytes),
            },
        }
    }

    pub fn key_value(id: &str, name: &str, fields: Map<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value: RecordValue::KeyValue { fields },
        }
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        match &self.value {
            RecordValue::Table { rows, .. } => rows,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rendered_message() {
        let response = RunStepResponse::pass(
            "No broken links were found in email #%d in %s's inbox",
            vec![json!(2), json!("user@mg.test")],
        );
        assert_eq!(
            response.rendered_message(),
            "No broken links were found in email #2 in user@mg.test's inbox"
        );
    }

    #[test]
    fn test_rendered_message_with_missing_args_and_literal_percent() {
        let response = RunStepResponse::error("100% sure: %s and %s", vec![json!("one")]);
        assert_eq!(response.rendered_message(), "100% sure: one and %s");
    }

    #[test]
    fn test_binary_record_is_base64() {
        let record = StepRecord::binary("eml", "Email Message", "text/eml", b"hello");
        match record.value {
            RecordValue::Binary { data, mime_type } => {
                assert_eq!(data, "aGVsbG8=");
                assert_eq!(mime_type, "text/eml");
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_response_serializes_outcome() {
        let response = RunStepResponse::fail("Broken links were found in the email", vec![]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["messageFormat"], "Broken links were found in the email");
    }
}
