// src/steps/email_count.rs
// =============================================================================
// Step: "there should be 3 emails in mailgun for user@domain"
// =============================================================================

use crate::steps::definition::{
    decode_request, whole_number, FieldDefinition, FieldType, StepDefinition, StepType,
};
use crate::steps::message::on_mailbox_domain;
use crate::steps::response::RunStepResponse;
use crate::steps::{Step, StepContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CountRequest {
    email: String,
    #[serde(deserialize_with = "whole_number")]
    count: u64,
}

pub struct EmailCountEquals {
    context: StepContext,
}

impl EmailCountEquals {
    pub const ID: &'static str = "EmailCountEqualsStep";

    pub fn new(context: StepContext) -> Self {
        Self { context }
    }

    pub fn boxed(context: StepContext) -> Box<dyn Step> {
        Box::new(Self::new(context))
    }

    pub fn describe() -> StepDefinition {
        StepDefinition {
            step_id: Self::ID,
            name: "Check the email count on a Mailgun Inbox",
            expression: r"there should be (?<count>\d+) emails in mailgun for (?<email>.+)",
            step_type: StepType::Validation,
            expected_fields: vec![
                FieldDefinition::required("email", FieldType::Email, "The inbox's email address"),
                FieldDefinition::required("count", FieldType::Numeric, "The email count"),
            ],
            expected_records: Vec::new(),
        }
    }

    async fn check(&self, request: &CountRequest) -> crate::error::Result<RunStepResponse> {
        let mailbox = self.context.mailbox.as_ref();
        if !on_mailbox_domain(mailbox, &request.email) {
            return Ok(RunStepResponse::error(
                "Can't check inbox for %s: email domain doesn't match %s",
                vec![json!(request.email), json!(mailbox.domain())],
            ));
        }

        let Some(inbox) = mailbox.get_inbox(&request.email).await? else {
            return Ok(RunStepResponse::error(
                "Cannot fetch inbox for: %s",
                vec![json!(request.email)],
            ));
        };

        if let Some(message) = inbox.message {
            return Ok(RunStepResponse::error(&message, vec![]));
        }

        if inbox.is_empty() {
            return Ok(RunStepResponse::fail(
                "Expected there to be %s emails, but no emails have been received",
                vec![json!(request.count)],
            ));
        }

        let received = inbox.len() as u64;
        if received == request.count {
            return Ok(RunStepResponse::pass(
                "Found %s emails, as expected",
                vec![json!(received)],
            ));
        }

        let subjects = inbox
            .items
            .iter()
            .map(|item| item.message.headers.subject.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(RunStepResponse::fail(
            "Expected there to be %s emails, but there were actually %s. Their subjects are: %s",
            vec![json!(request.count), json!(received), json!(subjects)],
        ))
    }
}

#[async_trait]
impl Step for EmailCountEquals {
    fn definition(&self) -> StepDefinition {
        Self::describe()
    }

    async fn execute(&self, data: &Value) -> RunStepResponse {
        let request: CountRequest = match decode_request(data) {
            Ok(request) => request,
            Err(verdict) => return verdict,
        };

        match self.check(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "counting emails failed");
                RunStepResponse::error(
                    "There was an error retrieving email messages: %s",
                    vec![json!(e.to_string())],
                )
            }
        }
    }
}
