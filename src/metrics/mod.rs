//! Owner-level win/loss aggregates computed from the fetched record
//! set. Pure data transforms: no I/O, no LLM involvement.

use serde::Serialize;

use crate::devrev::types::{OpportunityRecord, STAGE_CLOSED_LOST, STAGE_CLOSED_WON};

/// Won/lost tally for one owner, or for the whole record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub closed_won_count: u64,
    pub closed_lost_count: u64,
}

/// Per-owner aggregates keyed by normalized owner name, in first-seen
/// order. The ordering is part of the contract: chart slices and bars
/// follow it, so two runs over the same records draw identical charts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnerAggregates {
    wins: Vec<(String, u64)>,
    stages: Vec<(String, StageCounts)>,
    pub global: StageCounts,
}

/// Owner keys are trimmed and lowercased before aggregation. Distinct
/// people with identical display names therefore merge into one key,
/// a known, accepted approximation.
fn normalize_owner(name: &str) -> String {
    name.trim().to_lowercase()
}

impl OwnerAggregates {
    /// Build both breakdowns in one pass over the records.
    ///
    /// Records without a primary owner name are skipped silently.
    pub fn from_records(records: &[OpportunityRecord]) -> Self {
        let mut aggregates = OwnerAggregates::default();

        for record in records {
            let Some(owner) = record
                .primary_owner()
                .and_then(|identity| identity.full_name.as_deref())
            else {
                continue;
            };
            let owner = normalize_owner(owner);
            if owner.is_empty() {
                continue;
            }

            match record.stage_name() {
                Some(STAGE_CLOSED_WON) => {
                    aggregates.bump_win(&owner);
                    aggregates.stage_entry(&owner).closed_won_count += 1;
                    aggregates.global.closed_won_count += 1;
                }
                Some(STAGE_CLOSED_LOST) => {
                    aggregates.stage_entry(&owner).closed_lost_count += 1;
                    aggregates.global.closed_lost_count += 1;
                }
                _ => {
                    // Stage counts track every owned record so bar
                    // ordering is stable even for owners with only
                    // non-terminal stages in the window.
                    aggregates.stage_entry(&owner);
                }
            }
        }

        aggregates
    }

    fn bump_win(&mut self, owner: &str) {
        if let Some(entry) = self.wins.iter_mut().find(|(name, _)| name == owner) {
            entry.1 += 1;
        } else {
            self.wins.push((owner.to_string(), 1));
        }
    }

    fn stage_entry(&mut self, owner: &str) -> &mut StageCounts {
        if let Some(pos) = self.stages.iter().position(|(name, _)| name == owner) {
            return &mut self.stages[pos].1;
        }
        self.stages.push((owner.to_string(), StageCounts::default()));
        let last = self.stages.len() - 1;
        &mut self.stages[last].1
    }

    /// Closed-won counts per owner, first-seen order.
    pub fn wins(&self) -> &[(String, u64)] {
        &self.wins
    }

    /// Won/lost counts per owner, first-seen order.
    pub fn stage_counts(&self) -> &[(String, StageCounts)] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
