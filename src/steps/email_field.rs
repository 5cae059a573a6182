// src/steps/email_field.rs
// =============================================================================
// Step: 'the subject field of the email in position 1 from the inbox of
//        user@domain, Contains "Welcome"'
//
// Compares one top-level field of a stored message against an expectation.
// Positions index the inbox as the provider lists it.
// =============================================================================

use crate::steps::definition::{
    decode_request, optional_whole_number, scalar_text, FieldDefinition, FieldType,
    StepDefinition, StepType,
};
use crate::steps::response::RunStepResponse;
use crate::steps::{Step, StepContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct FieldRequest {
    email: String,
    field: String,
    #[serde(deserialize_with = "scalar_text")]
    expectation: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    position: Option<u64>,
    #[serde(default)]
    operator: String,
}

/// How the actual field value is compared with the expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// Exact, case-sensitive equality
    IsExactly,
    /// Case-insensitive substring match
    Contains,
    /// Case-insensitive substring absence
    DoesNotContain,
}

impl Operator {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Is Exactly" => Some(Operator::IsExactly),
            "Contains" => Some(Operator::Contains),
            "Does not Contain" => Some(Operator::DoesNotContain),
            _ => None,
        }
    }

    fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            Operator::IsExactly => expected == actual,
            Operator::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
            Operator::DoesNotContain => !actual.to_lowercase().contains(&expected.to_lowercase()),
        }
    }
}

pub struct EmailFieldValidation {
    context: StepContext,
}

impl EmailFieldValidation {
    pub const ID: &'static str = "EmailFieldValidation";

    pub fn new(context: StepContext) -> Self {
        Self { context }
    }

    pub fn boxed(context: StepContext) -> Box<dyn Step> {
        Box::new(Self::new(context))
    }

    pub fn describe() -> StepDefinition {
        StepDefinition {
            step_id: Self::ID,
            name: "Check a field on a Mailgun Email",
            expression: r#"the (?<field>[a-zA-Z0-9_-]+) field of the email in position (?<position>[a-zA-Z0-9_-]+) from the inbox of (?<email>.+), (?<operator>.+) "(?<expectation>.+)""#,
            step_type: StepType::Validation,
            expected_fields: vec![
                FieldDefinition::required("email", FieldType::Email, "The inbox's email address"),
                FieldDefinition::required("field", FieldType::String, "Field name to check"),
                FieldDefinition::required("expectation", FieldType::AnyScalar, "Expected field value"),
                FieldDefinition::required(
                    "position",
                    FieldType::Numeric,
                    "The nth message to check from the email's inbox",
                ),
                FieldDefinition::required(
                    "operator",
                    FieldType::String,
                    "The operator to use when performing the validation. Supported values are: Is Exactly, Contains, Does not Contain",
                ),
            ],
            expected_records: Vec::new(),
        }
    }

    async fn check(&self, request: &FieldRequest) -> crate::error::Result<RunStepResponse> {
        let Some(operator) = Operator::parse(&request.operator) else {
            return Ok(RunStepResponse::fail(
                r#"Invalid operator. "%s" is not supported."#,
                vec![json!(request.operator)],
            ));
        };

        let mailbox = self.context.mailbox.as_ref();
        let Some(inbox) = mailbox.get_inbox(&request.email).await? else {
            return Ok(RunStepResponse::fail(
                r#"Cannot fetch inbox for: "%s""#,
                vec![json!(request.email)],
            ));
        };

        if let Some(message) = &inbox.message {
            return Ok(RunStepResponse::error(
                "There was an error reaching mailgun: %s",
                vec![json!(message)],
            ));
        }

        let position = request.position.unwrap_or(1);
        let missing_position = || {
            RunStepResponse::fail(r#"Cannot fetch email in position: "%s""#, vec![json!(position)])
        };

        let Some(item) = usize::try_from(position)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|index| inbox.items.get(index))
        else {
            return Ok(missing_position());
        };

        let Some(email) = mailbox.get_email_by_storage_url(&item.storage.url).await? else {
            return Ok(missing_position());
        };

        let Some(actual) = email.field(&request.field) else {
            return Ok(RunStepResponse::fail(
                r#"The "%s" field was not found on the email in position %d"#,
                vec![json!(request.field), json!(position)],
            ));
        };

        if operator.matches(&request.expectation, &actual) {
            Ok(RunStepResponse::pass(
                "Expected value %s %s %s",
                vec![json!(request.expectation), json!(request.operator), json!(actual)],
            ))
        } else {
            Ok(RunStepResponse::fail(
                r#"Comparison failed using: "%s" operator. Actual: "%s" Expected: "%s""#,
                vec![json!(request.operator), json!(actual), json!(request.expectation)],
            ))
        }
    }
}

#[async_trait]
impl Step for EmailFieldValidation {
    fn definition(&self) -> StepDefinition {
        Self::describe()
    }

    async fn execute(&self, data: &Value) -> RunStepResponse {
        let request: FieldRequest = match decode_request(data) {
            Ok(request) => request,
            Err(verdict) => return verdict,
        };

        match self.check(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, field = %request.field, "field check failed");
                RunStepResponse::error(
                    "There was an error reaching mailgun: %s",
                    vec![json!(e.to_string())],
                )
            }
        }
    }
}
