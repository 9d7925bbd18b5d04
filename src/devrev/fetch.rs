//! Closed-opportunity fetch and close-date window filtering.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

use super::types::OpportunityRecord;
use super::DevRevClient;

/// Upstream page size for opportunity listing.
pub const OPPORTUNITY_PAGE_LIMIT: u32 = 100;

const WORK_TYPE_OPPORTUNITY: &str = "opportunity";

/// Fetch opportunities and keep those closed within the last
/// `timeframe_hours` hours, measured from the fetch-time wall clock.
///
/// Records without a parsable close timestamp are dropped. An empty
/// result is not an error; the caller decides whether it is terminal.
pub async fn fetch_closed_opportunities(
    client: &DevRevClient,
    timeframe_hours: u32,
) -> Result<Vec<OpportunityRecord>> {
    let records = client
        .list_works(WORK_TYPE_OPPORTUNITY, OPPORTUNITY_PAGE_LIMIT)
        .await?;
    let cutoff = Utc::now() - Duration::hours(i64::from(timeframe_hours));
    let filtered = filter_by_close_date(records, cutoff);
    log::info!(
        "{} opportunities closed since {}",
        filtered.len(),
        cutoff.to_rfc3339()
    );
    Ok(filtered)
}

/// Keep records whose close date parses and is at or after `cutoff`.
pub fn filter_by_close_date(
    records: Vec<OpportunityRecord>,
    cutoff: DateTime<Utc>,
) -> Vec<OpportunityRecord> {
    records
        .into_iter()
        .filter(|record| matches!(record.close_date(), Some(closed) if closed >= cutoff))
        .collect()
}
