//! Opportunity summarization: record projection and prompt assembly.
//!
//! The projected JSON shape is a prompt contract: the key set below is
//! what the instruction template was tuned against, so it is reproduced
//! exactly rather than serializing records wholesale.

use serde_json::{json, Value};

use crate::devrev::types::{Identity, OpportunityRecord};
use crate::error::{Error, Result};
use crate::llm::{LlmClient, SUMMARY_MAX_TOKENS, SUMMARY_MODEL};

/// Returned in place of a summary when the model yields no content.
/// A valid value, not an error: it flows through cleaning and
/// rendering like any other summary text.
pub const SUMMARY_FALLBACK: &str = "Summary generation failed.";

const SYSTEM_PROMPT: &str = "You are a business assistant that generates concise summaries \
of sales opportunities based on provided data.";

fn identity_details(identity: Option<&Identity>) -> Value {
    let identity = identity.cloned().unwrap_or_default();
    json!({
        "type": identity.kind,
        "display_id": identity.display_id,
        "display_name": identity.display_name,
        "email": identity.email,
        "full_name": identity.full_name,
        "id": identity.id,
        "state": identity.state,
    })
}

/// Project records to the fixed prompt shape.
pub fn opportunity_details(records: &[OpportunityRecord]) -> Value {
    let details: Vec<Value> = records
        .iter()
        .map(|opp| {
            let stage = opp.stage.clone().unwrap_or_default();
            json!({
                "id": opp.id,
                "type": opp.kind,
                "actual_close_date": opp.actual_close_date,
                "body": opp.body,
                "created_by": identity_details(opp.created_by.as_ref()),
                "created_date": opp.created_date,
                "custom_fields": opp.custom_fields,
                "display_id": opp.display_id,
                "modified_by": identity_details(opp.modified_by.as_ref()),
                "modified_date": opp.modified_date,
                "owned_by": opp.owned_by,
                "stage": {
                    "name": stage.name,
                    "notes": stage.notes,
                    "ordinal": stage.ordinal,
                    "stage": stage.stage,
                    "state": stage.state,
                },
                "stock_schema_fragment": opp.stock_schema_fragment,
                "tags": opp.tags,
                "title": opp.title,
            })
        })
        .collect();
    Value::Array(details)
}

fn build_user_prompt(details_json: &str, window_label: &str) -> String {
    format!(
        "This report summarizes the closed-won opportunities in the last {window_label}.\n\
         \n\
         Opportunities:\n\
         {details_json}\n\
         \n\
         Please summarize the following:\n\
         1. Total revenue from all closed-won opportunities.\n\
         2. The top customer by revenue.\n\
         3. The total number of closed-won opportunities.\n\
         4. A concise summary of each opportunity, including name, revenue, owner, customer, \
         tickets, and discussions.\n\
         \n\
         Provide the output in a well-structured, brief format such that i can make a pdf out \
         of it divide each subheading to sections intro Content and conclusion. Avoid raw data \
         and focus on insights."
    )
}

/// Summarize the record set via one chat-completion call.
///
/// An empty model response yields [`SUMMARY_FALLBACK`] as an `Ok` value.
pub async fn summarize(
    records: &[OpportunityRecord],
    window_label: &str,
    client: &LlmClient,
) -> Result<String> {
    let details = opportunity_details(records);
    let details_json = serde_json::to_string_pretty(&details)
        .map_err(|e| Error::Other(format!("failed to serialize opportunity details: {e}")))?;
    let prompt = build_user_prompt(&details_json, window_label);

    let content = client
        .complete(SYSTEM_PROMPT, &prompt, SUMMARY_MODEL, SUMMARY_MAX_TOKENS)
        .await?;
    Ok(content.unwrap_or_else(|| SUMMARY_FALLBACK.to_string()))
}
