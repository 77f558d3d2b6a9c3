//! Reconciler: matches input rows to status rows by natural key.
//!
//! Pure function over two snapshots. The caller applies `creations` to the
//! store before acting on anything, then re-reads and reconciles again so
//! freshly created rows show up in `actionable` with their row ids.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::pipeline::types::{InputRecord, Lead, StatusRecord};

/// A status row that has to exist before the pass continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreation {
    /// Normalized natural key.
    pub email: String,
}

/// Write intents and work list derived from one pair of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Keys seen in the input table with no status row, in input order.
    pub creations: Vec<PendingCreation>,
    /// Status rows with no successful send, in status-table order.
    pub actionable: Vec<Lead>,
    /// Input rows discarded for having no email.
    pub blank_inputs: usize,
}

impl ReconcilePlan {
    pub fn is_settled(&self) -> bool {
        self.creations.is_empty()
    }
}

/// Build the plan for one pass.
pub fn reconcile(inputs: &[InputRecord], statuses: &[StatusRecord]) -> ReconcilePlan {
    // key -> position in `statuses`; duplicates resolve to the last row.
    let mut index: HashMap<String, usize> = HashMap::with_capacity(statuses.len());
    for (pos, status) in statuses.iter().enumerate() {
        let key = status.key();
        if !key.is_empty() {
            index.insert(key, pos);
        }
    }

    let mut plan = ReconcilePlan::default();
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut names: HashMap<String, &str> = HashMap::new();

    for input in inputs {
        let key = input.key();
        if key.is_empty() {
            plan.blank_inputs += 1;
            continue;
        }

        let name = input.display_name.trim();
        if !name.is_empty() {
            names.entry(key.clone()).or_insert(name);
        }

        if !index.contains_key(&key) && scheduled.insert(key.clone()) {
            plan.creations.push(PendingCreation { email: key });
        }
    }

    for (pos, status) in statuses.iter().enumerate() {
        if !status.is_actionable() {
            continue;
        }
        let key = status.key();
        if index.get(&key) != Some(&pos) {
            debug!(row = %status.row, "Skipping shadowed duplicate status row");
            continue;
        }
        let display_name = names.get(&key).map(|n| n.to_string()).unwrap_or_default();
        plan.actionable.push(Lead {
            row: status.row,
            email: key,
            display_name,
        });
    }

    plan
}
