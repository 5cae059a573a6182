// src/steps/email_images.rs
// =============================================================================
// Step: "the 1st mailgun email for user@domain should not contain broken images"
//
// Same flow as the links step, but only <img src> URLs from the HTML body are
// checked. The HTML itself is attached so the scenario log can show what the
// images were embedded in.
// =============================================================================

use crate::checker::{extract_image_links, UrlType};
use crate::steps::definition::{
    decode_request, whole_number, ExpectedRecord, FieldDefinition, FieldType, RecordType,
    StepDefinition, StepType,
};
use crate::steps::message::{
    link_table, load_nth_message, number_candidates, without_ignored, LoadFailure,
};
use crate::steps::response::{RunStepResponse, StepRecord};
use crate::steps::{Step, StepContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagesRequest {
    email: String,
    #[serde(deserialize_with = "whole_number")]
    position: u64,
    #[serde(default)]
    pass_on_codes: Option<String>,
}

pub struct EmailImagesValidation {
    context: StepContext,
}

impl EmailImagesValidation {
    pub const ID: &'static str = "EmailImagesValidationStep";

    pub fn new(context: StepContext) -> Self {
        Self { context }
    }

    pub fn boxed(context: StepContext) -> Box<dyn Step> {
        Box::new(Self::new(context))
    }

    pub fn describe() -> StepDefinition {
        StepDefinition {
            step_id: Self::ID,
            name: "Check that no image link in an email is broken",
            expression: r"the (?<position>\d+)(?:(st|nd|rd|th))? mailgun email for (?<email>.+) should not contain broken images",
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
                    id: "eml",
                    record_type: RecordType::Binary,
                    fields: Vec::new(),
                    dynamic_fields: false,
                },
                ExpectedRecord {
                    id: "messages",
                    record_type: RecordType::Table,
                    fields: vec![
                        FieldDefinition::required("#", FieldType::Numeric, "Email receipt order number"),
                        FieldDefinition::required("Subject", FieldType::String, "Email subject line"),
                        FieldDefinition::required("From", FieldType::String, "Email from line"),
                        FieldDefinition::required("To", FieldType::String, "Email to line"),
                    ],
                    dynamic_fields: false,
                },
                ExpectedRecord {
                    id: "images",
                    record_type: RecordType::Table,
                    fields: vec![
                        FieldDefinition::required(
                            "Type",
                            FieldType::String,
                            "Image Found In (e.g. HTML or Plain-Text)",
                        ),
                        FieldDefinition::required(
                            "StatusCode",
                            FieldType::Numeric,
                            "HTTP Status code when the image was checked (e.g. 404 or 200)",
                        ),
                    ],
                    dynamic_fields: false,
                },
                ExpectedRecord {
                    id: "emailHtml",
                    record_type: RecordType::Keyvalue,
                    fields: Vec::new(),
                    dynamic_fields: true,
                },
            ],
        }
    }

    async fn check(&self, request: &ImagesRequest) -> Result<RunStepResponse, LoadFailure> {
        let loaded =
            load_nth_message(self.context.mailbox.as_ref(), &request.email, request.position)
                .await?;
        let html = loaded.email.body_html();

        let candidates = number_candidates(
            extract_image_links(&html)
                .into_iter()
                .map(|url| (url.replace("%3E", ""), UrlType::Html)),
        );

        let result = self
            .context
            .evaluator
            .evaluate(candidates, request.pass_on_codes.as_deref())
            .await;
        let result = without_ignored(result);

        let mut fields = Map::new();
        fields.insert("html".to_string(), json!(html));
        let records = [
            StepRecord::key_value("emailHtml", "Email Html", fields),
            link_table("images", &result),
            loaded.inbox_record,
        ];

        if result.has_broken() {
            return Ok(RunStepResponse::fail("Broken images were found in the email", vec![])
                .with_records(records));
        }

        Ok(RunStepResponse::pass(
            "No broken images were found in email #%d in %s's inbox",
            vec![json!(request.position), json!(request.email)],
        )
        .with_records(records))
    }
}

#[async_trait]
impl Step for EmailImagesValidation {
    fn definition(&self) -> StepDefinition {
        Self::describe()
    }

    async fn execute(&self, data: &Value) -> RunStepResponse {
        let request: ImagesRequest = match decode_request(data) {
            Ok(request) => request,
            Err(verdict) => return verdict,
        };

        match self.check(&request).await {
            Ok(response) => response,
            Err(LoadFailure::Verdict(verdict)) => verdict,
            Err(LoadFailure::Provider(e)) => {
                warn!(error = %e, "checking images failed");
                RunStepResponse::error(
                    "There was a problem checking images in email #%d in %s's inbox: %s",
                    vec![json!(request.position), json!(request.email), json!(e.to_string())],
                )
            }
        }
    }
}
