//! Follow-up scanner: raises `followup_required` once a deadline passes.
//!
//! Read-all, write-selective. Rows already flagged or closed by hand are
//! never rewritten, so running the scan twice is a no-op the second time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::pipeline::timestamps::{deadline_passed, parse_display};
use crate::pipeline::types::{RowId, StatusRecord, StatusUpdate};
use crate::store::RecordStore;
use crate::store::schema::check_status_layout;

/// Totals for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowupSummary {
    pub scanned: usize,
    pub flagged: usize,
}

/// Rows whose deadline has passed at `now` and that are neither flagged nor
/// completed.
pub fn due_for_followup(statuses: &[StatusRecord], now: DateTime<Utc>, tz: Tz) -> Vec<RowId> {
    statuses
        .iter()
        .filter(|status| {
            let due_at = status.followup_due_at.trim();
            if due_at.is_empty() || status.is_flagged() || status.is_completed() {
                return false;
            }
            if parse_display(due_at).is_none() {
                debug!(row = %status.row, value = due_at, "Unparseable followup_due_at, skipping");
                return false;
            }
            deadline_passed(due_at, now, tz)
        })
        .map(|status| status.row)
        .collect()
}

/// Writes the flags chosen by [`due_for_followup`].
pub struct FollowupScanner {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    status_table: String,
}

impl FollowupScanner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        status_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            timezone,
            status_table: status_table.into(),
        }
    }

    pub async fn run(&self) -> Result<FollowupSummary> {
        check_status_layout(self.store.as_ref(), &self.status_table).await?;

        let statuses: Vec<StatusRecord> = self
            .store
            .read_table(&self.status_table)
            .await?
            .iter()
            .map(StatusRecord::from_row)
            .collect();

        let due = due_for_followup(&statuses, self.clock.now(), self.timezone);
        let update = StatusUpdate::followup_flagged();
        for row in &due {
            self.store
                .apply_update(&self.status_table, *row, &update)
                .await?;
            info!(row = %row, "Follow-up required");
        }

        let summary = FollowupSummary {
            scanned: statuses.len(),
            flagged: due.len(),
        };
        info!(
            scanned = summary.scanned,
            flagged = summary.flagged,
            "Follow-up scan done"
        );
        Ok(summary)
    }
}
