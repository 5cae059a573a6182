// src/steps/mod.rs
// =============================================================================
// The steps this cog offers to the scenario host.
//
// Every step is listed in STEPS below with its id, its manifest definition
// and a constructor. Dispatch looks the id up there; there is no discovery
// at runtime.
//
// Submodules:
// - definition: manifest metadata and request decoding helpers
// - response: verdicts and evidence records
// - message: inbox / stored-message plumbing shared by the content steps
// - email_*: one module per step
// =============================================================================

mod definition;
mod email_count;
mod email_field;
mod email_images;
mod email_links;
mod message;
mod response;

#[cfg(test)]
mod testing;

pub use definition::{
    decode_request, ExpectedRecord, FieldDefinition, FieldType, Optionality, RecordType,
    StepDefinition, StepType,
};
pub use email_count::EmailCountEquals;
pub use email_field::EmailFieldValidation;
pub use email_images::EmailImagesValidation;
pub use email_links::EmailLinksValidation;
pub use response::{Outcome, RecordValue, RunStepResponse, StepRecord, TableColumn};

use crate::checker::Evaluator;
use crate::config::{AuthField, EXPECTED_AUTH_FIELDS};
use crate::mailgun::Mailbox;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

// What every step gets to work with
#[derive(Clone)]
pub struct StepContext {
    pub mailbox: Arc<dyn Mailbox>,
    pub evaluator: Evaluator,
}

#[async_trait]
pub trait Step: Send + Sync {
    fn definition(&self) -> StepDefinition;

    /// Runs the step. Always produces a response; problems become an
    /// error verdict rather than an `Err`.
    async fn execute(&self, data: &Value) -> RunStepResponse;
}

pub struct StepEntry {
    pub id: &'static str,
    pub definition: fn() -> StepDefinition,
    pub build: fn(StepContext) -> Box<dyn Step>,
}

pub const STEPS: &[StepEntry] = &[
    StepEntry {
        id: EmailCountEquals::ID,
        definition: EmailCountEquals::describe,
        build: EmailCountEquals::boxed,
    },
    StepEntry {
        id: EmailFieldValidation::ID,
        definition: EmailFieldValidation::describe,
        build: EmailFieldValidation::boxed,
    },
    StepEntry {
        id: EmailImagesValidation::ID,
        definition: EmailImagesValidation::describe,
        build: EmailImagesValidation::boxed,
    },
    StepEntry {
        id: EmailLinksValidation::ID,
        definition: EmailLinksValidation::describe,
        build: EmailLinksValidation::boxed,
    },
];

pub fn find_step(step_id: &str) -> Option<&'static StepEntry> {
    STEPS.iter().find(|entry| entry.id == step_id)
}

pub fn definitions() -> Vec<StepDefinition> {
    STEPS.iter().map(|entry| (entry.definition)()).collect()
}

// Everything the host needs to know to offer this cog's steps
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CogManifest {
    pub name: &'static str,
    pub label: &'static str,
    pub version: &'static str,
    pub auth_fields: &'static [AuthField],
    pub step_definitions: Vec<StepDefinition>,
}

pub fn manifest() -> CogManifest {
    CogManifest {
        name: env!("CARGO_PKG_NAME"),
        label: "Mailgun",
        version: env!("CARGO_PKG_VERSION"),
        auth_fields: EXPECTED_AUTH_FIELDS,
        step_definitions: definitions(),
    }
}

/// Runs one step by id.
///
/// Unknown ids and steps that panic both come back as error verdicts, so
/// the host always gets a response.
pub async fn run_step(context: &StepContext, step_id: &str, data: &Value) -> RunStepResponse {
    let Some(entry) = find_step(step_id) else {
        return RunStepResponse::error("Unknown step %s", vec![json!(step_id)]);
    };

    info!(step_id, "running step");
    let step = (entry.build)(context.clone());
    let outcome = AssertUnwindSafe(step.execute(data)).catch_unwind().await;

    match outcome {
        Ok(response) => {
            info!(step_id, outcome = ?response.outcome, "step finished");
            response
        }
        Err(_) => {
            error!(step_id, "step panicked");
            RunStepResponse::error("There was an unexpected error running step %s", vec![json!(step_id)])
        }
    }
}
