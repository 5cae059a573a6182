// src/steps/email_links.rs
// =============================================================================
// Step: "the 1st mailgun email for user@domain should not contain broken links"
//
// Collects every link in the nth received email (HTML anchors first, then
// URLs found in the plain-text body), checks them all, and fails if any is
// broken. The evidence table lists every link with its status code.
// =============================================================================

use crate::checker::{extract_anchor_links, extract_plain_links, UrlType};
use crate::steps::definition::{
    decode_request, whole_number, ExpectedRecord, FieldDefinition, FieldType, RecordType,
    StepDefinition, StepType,
};
use crate::steps::message::{
    link_table, load_nth_message, number_candidates, without_ignored, LoadFailure,
};
use crate::steps::response::RunStepResponse;
use crate::steps::{Step, StepContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksRequest {
    email: String,
    #[serde(deserialize_with = "whole_number")]
    position: u64,
    #[serde(default)]
    pass_on_codes: Option<String>,
}

pub struct EmailLinksValidation {
    context: StepContext,
}

impl EmailLinksValidation {
    pub const ID: &'static str = "EmailLinksValidationStep";

    pub fn new(context: StepContext) -> Self {
        Self { context }
    }

    pub fn boxed(context: StepContext) -> Box<dyn Step> {
        Box::new(Self::new(context))
    }

    pub fn describe() -> StepDefinition {
        StepDefinition {
            step_id: Self::ID,
            name: "Check that no link in an email is broken",
            expression: r"the (?<position>\d+)(?:(st|nd|rd|th))? mailgun email for (?<email>.+) should not contain broken links",
            step_type: StepType::Validation,
            expected_fields: vec![
                FieldDefinition::required("email", FieldType::Email, "The inbox's email address"),
                FieldDefinition::required(
                    "position",
                    FieldType::Numeric,
                    "The nth message to check from the email's inbox",
                ),
                FieldDefinition::optional(
                    "passOnCodes",
                    FieldType::String,
                    "Comma-separated status codes to treat as working (e.g. 403,429)",
                ),
            ],
            expected_records: vec![
                ExpectedRecord {
                    id: "links",
                    record_type: RecordType::Table,
                    fields: vec![
                        FieldDefinition::required(
                            "Type",
                            FieldType::String,
                            "Link Found In (e.g. HTML or Plain-Text)",
                        ),
                        FieldDefinition::required("Url", FieldType::String, "The link"),
                        FieldDefinition::required(
                            "StatusCode",
                            FieldType::Numeric,
                            "HTTP Status code when the link was checked (e.g. 404 or 200)",
                        ),
                    ],
                    dynamic_fields: true,
                },
                ExpectedRecord {
                    id: "messages",
                    record_type: RecordType::Table,
                    fields: Vec::new(),
                    dynamic_fields: true,
                },
                ExpectedRecord {
                    id: "eml",
                    record_type: RecordType::Binary,
                    fields: Vec::new(),
                    dynamic_fields: false,
                },
            ],
        }
    }

    async fn check(&self, request: &LinksRequest) -> Result<RunStepResponse, LoadFailure> {
        let loaded =
            load_nth_message(self.context.mailbox.as_ref(), &request.email, request.position)
                .await?;

        let html_links = extract_anchor_links(&loaded.email.body_html())
            .into_iter()
            .map(|url| (url, UrlType::Html));
        let plain_links = extract_plain_links(&loaded.email.body_plain())
            .into_iter()
            .map(|url| (url, UrlType::Plain));
        // Encoded '>' marks a URL that swallowed the end of its tag
        let candidates = number_candidates(
            html_links
                .chain(plain_links)
                .filter(|(url, _)| !url.contains("%3E")),
        );

        let result = self
            .context
            .evaluator
            .evaluate(candidates, request.pass_on_codes.as_deref())
            .await;
        let result = without_ignored(result);
        let records = [link_table("links", &result), loaded.inbox_record];

        if result.has_broken() {
            return Ok(RunStepResponse::fail("Broken links were found in the email", vec![])
                .with_records(records));
        }

        Ok(RunStepResponse::pass(
            "No broken links were found in email #%d in %s's inbox",
            vec![json!(request.position), json!(request.email)],
        )
        .with_records(records))
    }
}

#[async_trait]
impl Step for EmailLinksValidation {
    fn definition(&self) -> StepDefinition {
        Self::describe()
    }

    async fn execute(&self, data: &Value) -> RunStepResponse {
        let request: LinksRequest = match decode_request(data) {
            Ok(request) => request,
            Err(verdict) => return verdict,
        };

        match self.check(&request).await {
            Ok(response) => response,
            Err(LoadFailure::Verdict(verdict)) => verdict,
            Err(LoadFailure::Provider(e)) => {
                warn!(error = %e, "checking links failed");
                RunStepResponse::error(
                    "There was a problem checking links in email #%d in %s's inbox: %s",
                    vec![json!(request.position), json!(request.email), json!(e.to_string())],
                )
            }
        }
    }
}
