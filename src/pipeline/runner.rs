//! The two passes the binary exposes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{ScheduleConfig, StoreConfig};
use crate::error::Result;
use crate::pipeline::followup::{FollowupScanner, FollowupSummary};
use crate::pipeline::lifecycle::{LeadOutcome, LifecycleEngine};
use crate::pipeline::reconcile::{ReconcilePlan, reconcile};
use crate::pipeline::timestamps::mask_email;
use crate::pipeline::types::{InputRecord, StatusRecord, status_columns};
use crate::store::RecordStore;
use crate::store::schema::{check_input_layout, check_status_layout};
use crate::store::traits::pending_status_defaults;

/// Totals for one acknowledgement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AckSummary {
    /// Status rows created for newly seen leads.
    pub created: usize,
    pub actionable: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Reconcile, create missing status rows, then acknowledge every actionable
/// lead in status-table order.
///
/// With `dry_run` the missing rows are still created, but nothing is sent
/// and no lifecycle field is written.
pub async fn run_ack_pass(
    store: &dyn RecordStore,
    engine: &LifecycleEngine,
    tables: &StoreConfig,
    dry_run: bool,
) -> Result<AckSummary> {
    check_input_layout(store, &tables.input_table).await?;
    check_status_layout(store, &tables.status_table).await?;

    let inputs: Vec<InputRecord> = store
        .read_table(&tables.input_table)
        .await?
        .iter()
        .map(InputRecord::from_row)
        .collect();

    let mut plan = reconcile(&inputs, &read_statuses(store, &tables.status_table).await?);
    debug!(
        inputs = inputs.len(),
        blank = plan.blank_inputs,
        creations = plan.creations.len(),
        "Reconciled"
    );

    let created = plan.creations.len();
    if !plan.is_settled() {
        let defaults = pending_status_defaults();
        for creation in &plan.creations {
            let row = store
                .ensure_row_exists(
                    &tables.status_table,
                    status_columns::EMAIL,
                    &creation.email,
                    &defaults,
                )
                .await?;
            info!(row = %row, email = %mask_email(&creation.email), "New lead");
        }
        plan = reconcile(&inputs, &read_statuses(store, &tables.status_table).await?);
    }

    let mut summary = AckSummary {
        created,
        actionable: plan.actionable.len(),
        ..AckSummary::default()
    };

    if dry_run {
        log_dry_run(&plan);
    } else {
        let attachments = engine.template().attachments();
        for lead in &plan.actionable {
            match engine.process(lead, attachments).await? {
                LeadOutcome::Sent { .. } => summary.sent += 1,
                LeadOutcome::Failed { .. } => summary.failed += 1,
            }
        }
    }

    info!(
        created = summary.created,
        actionable = summary.actionable,
        sent = summary.sent,
        failed = summary.failed,
        dry_run,
        "Acknowledgement pass done: {} lead(s) processed",
        summary.sent + summary.failed
    );
    Ok(summary)
}

/// Flag every sent lead whose follow-up deadline has passed.
pub async fn run_followup_pass(
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    schedule: &ScheduleConfig,
    tables: &StoreConfig,
) -> Result<FollowupSummary> {
    FollowupScanner::new(store, clock, schedule.timezone, tables.status_table.clone())
        .run()
        .await
}

async fn read_statuses(store: &dyn RecordStore, table: &str) -> Result<Vec<StatusRecord>> {
    Ok(store
        .read_table(table)
        .await?
        .iter()
        .map(StatusRecord::from_row)
        .collect())
}

fn log_dry_run(plan: &ReconcilePlan) {
    for lead in &plan.actionable {
        info!(
            row = %lead.row,
            email = %mask_email(&lead.email),
            "Dry run: would send acknowledgement"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::notify::AcknowledgementTemplate;
    use crate::personalize::PolishSalutations;
    use crate::pipeline::testing::{INPUT, MemoryStore, STATUS, StubNotifier};
    use crate::pipeline::types::input_columns;

    fn tables() -> StoreConfig {
        StoreConfig {
            db_path: PathBuf::from(":memory:"),
            input_table: INPUT.into(),
            status_table: STATUS.into(),
        }
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ))
    }

    fn engine(store: Arc<MemoryStore>, notifier: Arc<StubNotifier>) -> LifecycleEngine {
        LifecycleEngine::new(
            store,
            notifier,
            Arc::new(PolishSalutations),
            AcknowledgementTemplate::new(
                "https://cal.test/flexi",
                vec!["a.pdf".into(), "b.pdf".into(), "c.pdf".into()],
            )
            .unwrap(),
            clock(),
            ScheduleConfig::default(),
            STATUS,
        )
    }

    fn lead(store: &MemoryStore, name: &str, email: &str) {
        store.push(
            INPUT,
            &[(input_columns::DISPLAY_NAME, name), (input_columns::EMAIL, email)],
        );
    }

    fn statuses(store: &MemoryStore) -> Vec<StatusRecord> {
        store.rows(STATUS).iter().map(StatusRecord::from_row).collect()
    }

    #[tokio::test]
    async fn new_leads_are_created_and_acknowledged_in_one_pass() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        lead(&store, "Anna Kowalska", "Anna@Example.com");
        lead(&store, "Marek Nowak", "marek@example.com");
        let engine = engine(store.clone(), notifier.clone());

        let summary = run_ack_pass(&*store, &engine, &tables(), false)
            .await
            .unwrap();
        assert_eq!(
            summary,
            AckSummary { created: 2, actionable: 2, sent: 2, failed: 0 }
        );
        assert_eq!(notifier.recipients(), vec!["anna@example.com", "marek@example.com"]);

        let rows = statuses(&store);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.send_status == "OK"));
        assert_eq!(rows[0].email, "anna@example.com");
    }

    #[tokio::test]
    async fn rerun_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        lead(&store, "Anna Kowalska", "anna@example.com");
        let engine = engine(store.clone(), notifier.clone());

        run_ack_pass(&*store, &engine, &tables(), false).await.unwrap();
        let second = run_ack_pass(&*store, &engine, &tables(), false)
            .await
            .unwrap();

        assert_eq!(second, AckSummary::default());
        assert_eq!(notifier.attempts().len(), 1);
        assert_eq!(statuses(&store).len(), 1);
    }

    #[tokio::test]
    async fn key_variants_share_one_status_row() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        lead(&store, "Foo", "Foo@Bar.com");
        lead(&store, "Foo", " foo@bar.com ");
        lead(&store, "Foo", "foo@bar.com");
        lead(&store, "", "   ");
        let engine = engine(store.clone(), notifier.clone());

        let summary = run_ack_pass(&*store, &engine, &tables(), false)
            .await
            .unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(statuses(&store).len(), 1);
    }

    #[tokio::test]
    async fn failed_lead_is_retried_next_pass() {
        let store = Arc::new(MemoryStore::new());
        lead(&store, "Anna Kowalska", "anna@example.com");
        lead(&store, "Marek Nowak", "marek@example.com");

        let flaky = Arc::new(StubNotifier::failing_for(&["marek@example.com"]));
        let first = run_ack_pass(&*store, &engine(store.clone(), flaky), &tables(), false)
            .await
            .unwrap();
        assert_eq!(first.sent, 1);
        assert_eq!(first.failed, 1);
        assert!(statuses(&store)[1].send_status.starts_with("ERROR:"));

        let healthy = Arc::new(StubNotifier::default());
        let second = run_ack_pass(
            &*store,
            &engine(store.clone(), healthy.clone()),
            &tables(),
            false,
        )
        .await
        .unwrap();
        assert_eq!(second, AckSummary { created: 0, actionable: 1, sent: 1, failed: 0 });
        assert_eq!(healthy.recipients(), vec!["marek@example.com"]);
    }

    #[tokio::test]
    async fn dry_run_creates_rows_but_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        lead(&store, "Anna Kowalska", "anna@example.com");
        let engine = engine(store.clone(), notifier.clone());

        let summary = run_ack_pass(&*store, &engine, &tables(), true)
            .await
            .unwrap();
        assert_eq!(summary, AckSummary { created: 1, actionable: 1, sent: 0, failed: 0 });
        assert!(notifier.attempts().is_empty());
        assert!(store.writes().is_empty());
        assert!(statuses(&store)[0].is_actionable());
    }

    #[tokio::test]
    async fn orphaned_status_row_is_acknowledged_with_generic_greeting() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        store.push(STATUS, &[(status_columns::EMAIL, "walkin@example.com")]);
        let engine = engine(store.clone(), notifier.clone());

        let summary = run_ack_pass(&*store, &engine, &tables(), false)
            .await
            .unwrap();
        assert_eq!(summary.sent, 1);
        assert!(notifier.attempts()[0].body.starts_with("Dzień dobry,\n"));
    }

    #[tokio::test]
    async fn missing_input_column_fails_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        store.set_headers(INPUT, &[input_columns::DISPLAY_NAME]);
        lead(&store, "Anna Kowalska", "anna@example.com");
        let engine = engine(store.clone(), notifier.clone());

        let err = run_ack_pass(&*store, &engine, &tables(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(store.rows(STATUS).is_empty());
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_after_send_ends_the_pass() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(StubNotifier::default());
        lead(&store, "Anna Kowalska", "anna@example.com");
        lead(&store, "Marek Nowak", "marek@example.com");
        // Rows exist up front so the failure hits the lifecycle write.
        run_ack_pass(
            &*store,
            &engine(store.clone(), notifier.clone()),
            &tables(),
            true,
        )
        .await
        .unwrap();
        store.fail_writes(true);

        let err = run_ack_pass(
            &*store,
            &engine(store.clone(), notifier.clone()),
            &tables(),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle(crate::error::LifecycleError::DeliveredButNotRecorded { .. })
        ));
        assert_eq!(notifier.attempts().len(), 1);
    }

    #[tokio::test]
    async fn followup_pass_uses_configured_table() {
        let store = Arc::new(MemoryStore::new());
        store.push(
            STATUS,
            &[
                (status_columns::EMAIL, "anna@example.com"),
                (status_columns::SENT_AT, "2025-05-01 12:00"),
                (status_columns::SEND_STATUS, "OK"),
                (status_columns::FOLLOWUP_DUE_AT, "2025-05-04 12:00"),
                (status_columns::FOLLOWUP_REQUIRED, "NO"),
            ],
        );

        let summary = run_followup_pass(store.clone(), clock(), &ScheduleConfig::default(), &tables())
            .await
            .unwrap();
        assert_eq!(summary, FollowupSummary { scanned: 1, flagged: 1 });
    }
}
