//! Lifecycle engine: one send attempt and one status write per lead.
//!
//! A transport failure is recorded on the row and the lead stays actionable.
//! A store failure is returned to the caller and ends the pass.

use std::path::PathBuf;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::error::LifecycleError;
use crate::notify::{AcknowledgementTemplate, Notifier, OutgoingEmail, SendOutcome};
use crate::personalize::SalutationProvider;
use crate::pipeline::timestamps::{followup_due, format_display, mask_email};
use crate::pipeline::types::{Lead, StatusUpdate};
use crate::store::RecordStore;

/// What happened to one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeadOutcome {
    Sent {
        sent_at: String,
        followup_due_at: String,
    },
    Failed {
        message: String,
    },
}

/// Drives an actionable lead through send + persist.
pub struct LifecycleEngine {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    salutations: Arc<dyn SalutationProvider>,
    template: AcknowledgementTemplate,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    window_days: u32,
    status_table: String,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        salutations: Arc<dyn SalutationProvider>,
        template: AcknowledgementTemplate,
        clock: Arc<dyn Clock>,
        schedule: ScheduleConfig,
        status_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            salutations,
            template,
            clock,
            timezone: schedule.timezone,
            window_days: schedule.followup_window_days,
            status_table: status_table.into(),
        }
    }

    pub fn template(&self) -> &AcknowledgementTemplate {
        &self.template
    }

    /// Compose the acknowledgement for `lead`.
    pub fn compose(&self, lead: &Lead, attachments: &[PathBuf]) -> OutgoingEmail {
        let salutation = self.salutations.salutation_for(&lead.display_name);
        let draft = self.template.draft(salutation.as_deref());
        OutgoingEmail {
            to: lead.email.clone(),
            subject: draft.subject,
            body: draft.body,
            attachments: attachments.to_vec(),
        }
    }

    /// Send the acknowledgement and record the result.
    pub async fn process(
        &self,
        lead: &Lead,
        attachments: &[PathBuf],
    ) -> Result<LeadOutcome, LifecycleError> {
        let to = mask_email(&lead.email);
        let email = self.compose(lead, attachments);

        match SendOutcome::from_result(self.notifier.send(&email).await) {
            SendOutcome::Success => {
                let sent_at = format_display(self.clock.now(), self.timezone);
                let followup_due_at = followup_due(&sent_at, self.window_days)?;
                let update = StatusUpdate::sent(&sent_at, &followup_due_at);

                if let Err(source) = self
                    .store
                    .apply_update(&self.status_table, lead.row, &update)
                    .await
                {
                    error!(
                        row = %lead.row,
                        to = %to,
                        error = %source,
                        "Acknowledgement delivered but status not recorded; possible duplicate send on next run"
                    );
                    return Err(LifecycleError::DeliveredButNotRecorded {
                        row: lead.row.0,
                        source,
                    });
                }

                info!(
                    row = %lead.row,
                    to = %to,
                    sent_at = %sent_at,
                    followup_due_at = %followup_due_at,
                    "Lead acknowledged"
                );
                Ok(LeadOutcome::Sent {
                    sent_at,
                    followup_due_at,
                })
            }
            SendOutcome::Failure(message) => {
                warn!(row = %lead.row, to = %to, error = %message, "Acknowledgement failed, will retry next run");
                self.store
                    .apply_update(
                        &self.status_table,
                        lead.row,
                        &StatusUpdate::send_failed(&message),
                    )
                    .await
                    .map_err(|source| LifecycleError::ErrorNotRecorded {
                        row: lead.row.0,
                        source,
                    })?;
                Ok(LeadOutcome::Failed { message })
            }
        }
    }
}
