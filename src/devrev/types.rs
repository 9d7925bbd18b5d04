use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal stage name for a won deal.
pub const STAGE_CLOSED_WON: &str = "closed_won";
/// Terminal stage name for a lost deal.
pub const STAGE_CLOSED_LOST: &str = "closed_lost";

/// A user identity attached to a work item (creator, modifier, owner).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub display_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub id: Option<String>,
    pub state: Option<String>,
}

/// Stage descriptor on an opportunity record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub name: Option<String>,
    pub notes: Option<Value>,
    pub ordinal: Option<Value>,
    pub stage: Option<Value>,
    pub state: Option<String>,
}

/// One opportunity work item as returned by `works.list`.
///
/// Every field except `id` is optional: upstream payloads vary by
/// revision and by tenant schema, so the shape is validated once at the
/// fetch boundary and consumed as plain data afterwards. Metadata
/// fields with no fixed schema (`custom_fields`, `tags`,
/// `stock_schema_fragment`) pass through verbatim into the
/// summarization prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityRecord {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub actual_close_date: Option<String>,
    pub body: Option<String>,
    pub created_by: Option<Identity>,
    pub created_date: Option<String>,
    pub custom_fields: Value,
    pub display_id: Option<String>,
    pub modified_by: Option<Identity>,
    pub modified_date: Option<String>,
    pub owned_by: Vec<Identity>,
    pub revenue: Option<f64>,
    pub stage: Option<Stage>,
    pub stock_schema_fragment: Value,
    pub tags: Value,
}

impl OpportunityRecord {
    /// Parsed close timestamp, or None when absent or unparsable.
    pub fn close_date(&self) -> Option<DateTime<Utc>> {
        self.actual_close_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
    }

    /// First entry in `owned_by` is the primary owner.
    pub fn primary_owner(&self) -> Option<&Identity> {
        self.owned_by.first()
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.stage.as_ref().and_then(|s| s.name.as_deref())
    }
}

/// Envelope for `works.list`. The `works` field must be a sequence;
/// anything else fails deserialization and surfaces as an upstream
/// fetch error.
#[derive(Debug, Clone, Deserialize)]
pub struct WorksListResponse {
    pub works: Vec<OpportunityRecord>,
}

/// Envelope for `timeline-entries.create` / `.update`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEntryResponse {
    pub timeline_entry: TimelineEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
}
