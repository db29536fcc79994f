//! Lead merge engine.
//!
//! A primary lead absorbs secondaries one at a time, in the order supplied.
//! Only notes, tags and activities merge; every other field on the primary
//! is left untouched. The whole batch runs inside one `MergeTx` and commits
//! once, so a failure anywhere leaves the store as it was.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use leadgen_common::LeadId;

use crate::error::{MergeError, MergeResult};
use crate::traits::{DuplicateGroup, LeadStore, MergeableLead};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub primary_id: LeadId,
    /// Secondaries absorbed and deleted, in processing order.
    pub merged: Vec<LeadId>,
    /// Secondary ids that no longer existed (or named the primary itself).
    pub skipped: Vec<LeadId>,
    pub activities_moved: u64,
}

pub struct MergeEngine {
    store: Arc<dyn LeadStore>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Groups of two or more leads sharing a company and a (non-null) contact.
    pub async fn find_duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let groups: Vec<DuplicateGroup> = self
            .store
            .duplicate_groups()
            .await?
            .into_iter()
            .filter(|g| g.lead_ids.len() > 1)
            .collect();

        debug!(groups = groups.len(), "Duplicate lead groups found");
        Ok(groups)
    }

    /// Fold `secondary_ids` into `primary_id`, then delete them.
    pub async fn merge(&self, primary_id: LeadId, secondary_ids: &[LeadId]) -> MergeResult<MergeReport> {
        let mut tx = self.store.begin_merge().await?;

        let mut primary = tx
            .load_lead(primary_id)
            .await?
            .ok_or(MergeError::PrimaryNotFound(primary_id))?;

        let mut report = MergeReport {
            primary_id,
            ..Default::default()
        };

        for &secondary_id in secondary_ids {
            if secondary_id == primary_id {
                report.skipped.push(secondary_id);
                continue;
            }

            let Some(secondary) = tx.load_lead(secondary_id).await? else {
                debug!(secondary_id, "Secondary lead missing, skipping");
                report.skipped.push(secondary_id);
                continue;
            };

            absorb_secondary(&mut primary, &secondary);
            report.activities_moved += tx.reassign_activities(secondary_id, primary_id).await?;
            tx.delete_lead(secondary_id).await?;
            report.merged.push(secondary_id);
        }

        if !report.merged.is_empty() {
            tx.save_lead(&primary).await?;
        }
        tx.commit().await?;

        info!(
            primary_id,
            merged = report.merged.len(),
            skipped = report.skipped.len(),
            activities_moved = report.activities_moved,
            "Merged leads"
        );
        Ok(report)
    }
}

/// Apply the field-combination rules for one secondary.
///
/// Notes: appended under a separator naming the secondary; adopted outright
/// when the primary has none. Tags: ordered union, primary's order first.
pub fn absorb_secondary(primary: &mut MergeableLead, secondary: &MergeableLead) {
    if let Some(notes) = secondary.notes.as_deref().filter(|n| !n.is_empty()) {
        primary.notes = Some(match primary.notes.take().filter(|n| !n.is_empty()) {
            Some(existing) => format!(
                "{existing}\n\n--- Merged from Lead #{} ---\n{notes}",
                secondary.id
            ),
            None => notes.to_string(),
        });
    }

    for tag in &secondary.tags {
        if !primary.tags.contains(tag) {
            primary.tags.push(tag.clone());
        }
    }
}
