// src/steps/message.rs
// =============================================================================
// Shared plumbing for the steps that check the content of one email:
//
// 1. the address must be on the configured Mailgun domain
// 2. the inbox must exist and not carry a provider error
// 3. the nth received message must exist
// 4. evidence about the inbox is attached (message table, or the raw .eml
//    when there is only one message)
// 5. the stored message is loaded
//
// Any step-level problem comes back as a ready-made error verdict.
// =============================================================================

use crate::checker::{CandidateUrl, EvaluationResult, LinkCheckResult};
use crate::error::Error;
use crate::mailgun::{Email, Inbox, InboxItem, Mailbox};
use crate::steps::response::{RunStepResponse, StepRecord};
use serde_json::{json, Map, Value};
use tracing::debug;

// Why loading a message stopped
pub(crate) enum LoadFailure {
    /// A verdict to return as-is
    Verdict(RunStepResponse),
    /// The provider call itself failed
    Provider(Error),
}

impl From<Error> for LoadFailure {
    fn from(e: Error) -> Self {
        LoadFailure::Provider(e)
    }
}

pub(crate) struct LoadedMessage {
    pub email: Email,
    pub inbox_record: StepRecord,
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

pub(crate) fn on_mailbox_domain(mailbox: &dyn Mailbox, address: &str) -> bool {
    domain_of(address)
        .map(|domain| domain.eq_ignore_ascii_case(mailbox.domain()))
        .unwrap_or(false)
}

// Error verdict when the address is not on the configured domain
pub(crate) fn check_domain(mailbox: &dyn Mailbox, address: &str) -> Option<RunStepResponse> {
    if on_mailbox_domain(mailbox, address) {
        None
    } else {
        Some(RunStepResponse::error(
            "Couldn't check %s's email: Only addresses with the %s domain can be checked.",
            vec![json!(address), json!(mailbox.domain())],
        ))
    }
}

pub(crate) async fn load_nth_message(
    mailbox: &dyn Mailbox,
    address: &str,
    position: u64,
) -> Result<LoadedMessage, LoadFailure> {
    if let Some(verdict) = check_domain(mailbox, address) {
        return Err(LoadFailure::Verdict(verdict));
    }

    let Some(inbox) = mailbox.get_inbox(address).await? else {
        return Err(LoadFailure::Verdict(RunStepResponse::error(
            "There was a problem checking %s's email: no inbox found.",
            vec![json!(address)],
        )));
    };

    if let Some(message) = &inbox.message {
        return Err(LoadFailure::Verdict(RunStepResponse::error(
            "There was a problem checking %s's email: %s",
            vec![json!(address), json!(message)],
        )));
    }

    let Some(item) = usize::try_from(position)
        .ok()
        .and_then(|p| inbox.nth_received(p))
    else {
        return Err(LoadFailure::Verdict(RunStepResponse::error(
            "Email #%d hasn't been received yet: there are %d message(s) in the inbox.",
            vec![json!(position), json!(inbox.len())],
        )));
    };
    let storage_url = item.storage.url.clone();
    debug!(address, position, storage_url = %storage_url, "loading stored message");

    let inbox_record = if inbox.len() > 1 {
        message_table(&inbox)
    } else {
        let raw = mailbox.get_raw_mime_message(&storage_url).await?;
        StepRecord::binary("eml", "Email Message", "text/eml", raw.as_bytes())
    };

    let Some(email) = mailbox.get_email_by_storage_url(&storage_url).await? else {
        return Err(LoadFailure::Verdict(RunStepResponse::error(
            "There was a problem reading email #%d: email found but couldn't be read from storage.",
            vec![json!(position)],
        )));
    };

    Ok(LoadedMessage {
        email,
        inbox_record,
    })
}

// Table of every received message, oldest first
pub(crate) fn message_table(inbox: &Inbox) -> StepRecord {
    let rows = inbox
        .received_in_order()
        .into_iter()
        .enumerate()
        .map(|(i, item)| message_row(i + 1, item))
        .collect();

    StepRecord::table(
        "messages",
        "Received Email Messages",
        &[("#", "#"), ("Subject", "Subject"), ("From", "From"), ("To", "To")],
        rows,
    )
}

fn message_row(number: usize, item: &InboxItem) -> Map<String, Value> {
    let headers = &item.message.headers;
    let mut row = Map::new();
    row.insert("#".to_string(), json!(number));
    row.insert("Subject".to_string(), json!(headers.subject));
    row.insert("From".to_string(), json!(headers.from));
    row.insert("To".to_string(), json!(headers.to));
    row
}

// Numbers candidates in the order given, starting at 1
pub(crate) fn number_candidates(
    urls: impl IntoIterator<Item = (String, crate::checker::UrlType)>,
) -> Vec<CandidateUrl> {
    urls.into_iter()
        .enumerate()
        .map(|(i, (url, url_type))| CandidateUrl::new(url, url_type, i + 1))
        .collect()
}

// Links that never count: marketing-platform test links and phone numbers
pub(crate) fn is_ignored_url(url: &str) -> bool {
    url.contains("/track?mktoTestLink") || url.starts_with("tel:")
}

// Filters ignored URLs out of a result before any verdict is taken
pub(crate) fn without_ignored(mut result: EvaluationResult) -> EvaluationResult {
    result.exclude(is_ignored_url);
    result
}

// Evidence table of every evaluated URL, in email order
pub(crate) fn link_table(id: &str, result: &EvaluationResult) -> StepRecord {
    let rows = result.all_sorted().iter().map(link_row).collect();
    StepRecord::table(
        id,
        "Found Links",
        &[
            ("Type", "Type"),
            ("Url", "URL"),
            ("StatusCode", "StatusCode"),
            ("FinalUrl", "FinalUrl"),
        ],
        rows,
    )
}

fn link_row(link: &LinkCheckResult) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("Type".to_string(), json!(link.url_type.to_string()));
    row.insert("Url".to_string(), json!(link.url));
    row.insert("StatusCode".to_string(), json!(link.status_code));
    row.insert("FinalUrl".to_string(), json!(link.final_url));
    row
}
