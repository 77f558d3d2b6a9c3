//! Shared data model for the lead pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::pipeline::timestamps::{normalize_email, truncate_chars};

// ── Column names ────────────────────────────────────────────────────

/// Input table columns.
pub mod input_columns {
    pub const DISPLAY_NAME: &str = "display_name";
    pub const EMAIL: &str = "email";
    pub const SECONDARY_PHONE: &str = "secondary_phone";

    /// Columns a pass cannot run without.
    pub const REQUIRED: &[&str] = &[DISPLAY_NAME, EMAIL];
}

/// Status table columns.
pub mod status_columns {
    pub const EMAIL: &str = "email";
    pub const SENT_AT: &str = "sent_at";
    pub const SEND_STATUS: &str = "send_status";
    pub const FOLLOWUP_DUE_AT: &str = "followup_due_at";
    pub const FOLLOWUP_REQUIRED: &str = "followup_required";
    pub const FOLLOWUP_COMPLETED_AT: &str = "followup_completed_at";

    /// The full persisted layout.
    pub const REQUIRED: &[&str] = &[
        EMAIL,
        SENT_AT,
        SEND_STATUS,
        FOLLOWUP_DUE_AT,
        FOLLOWUP_REQUIRED,
        FOLLOWUP_COMPLETED_AT,
    ];

    /// The only columns an update may touch.
    pub const SYSTEM: &[&str] = &[SENT_AT, SEND_STATUS, FOLLOWUP_DUE_AT, FOLLOWUP_REQUIRED];
}

/// Maximum characters of a transport error kept in `send_status`.
pub const ERROR_MESSAGE_MAX_CHARS: usize = 120;

const STATUS_OK: &str = "OK";
const STATUS_ERROR_PREFIX: &str = "ERROR:";
const FLAG_YES: &str = "YES";
const FLAG_NO: &str = "NO";

// ── Rows ────────────────────────────────────────────────────────────

/// Store-assigned identifier of a table row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId(pub i64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One raw row, cells addressed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub id: RowId,
    pub cells: BTreeMap<String, String>,
}

impl TableRow {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    /// Cell text, or `""` when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A row of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub display_name: String,
    pub email: String,
    pub secondary_phone: String,
}

impl InputRecord {
    pub fn from_row(row: &TableRow) -> Self {
        Self {
            display_name: row.get(input_columns::DISPLAY_NAME).to_string(),
            email: row.get(input_columns::EMAIL).to_string(),
            secondary_phone: row.get(input_columns::SECONDARY_PHONE).to_string(),
        }
    }

    /// Natural key; empty when the row is not a lead.
    pub fn key(&self) -> String {
        normalize_email(&self.email)
    }
}

/// A row of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub row: RowId,
    pub email: String,
    pub sent_at: String,
    pub send_status: String,
    pub followup_due_at: String,
    pub followup_required: String,
    pub followup_completed_at: String,
}

impl StatusRecord {
    pub fn from_row(row: &TableRow) -> Self {
        Self {
            row: row.id,
            email: row.get(status_columns::EMAIL).to_string(),
            sent_at: row.get(status_columns::SENT_AT).to_string(),
            send_status: row.get(status_columns::SEND_STATUS).to_string(),
            followup_due_at: row.get(status_columns::FOLLOWUP_DUE_AT).to_string(),
            followup_required: row.get(status_columns::FOLLOWUP_REQUIRED).to_string(),
            followup_completed_at: row.get(status_columns::FOLLOWUP_COMPLETED_AT).to_string(),
        }
    }

    pub fn key(&self) -> String {
        normalize_email(&self.email)
    }

    /// No successful send yet; errored records stay actionable.
    pub fn is_actionable(&self) -> bool {
        !self.key().is_empty() && self.sent_at.trim().is_empty()
    }

    pub fn is_flagged(&self) -> bool {
        self.followup_required.trim().eq_ignore_ascii_case(FLAG_YES)
    }

    /// Follow-up closed by hand.
    pub fn is_completed(&self) -> bool {
        !self.followup_completed_at.trim().is_empty()
    }

    pub fn send_status(&self) -> SendStatus {
        SendStatus::parse(&self.send_status)
    }

    pub fn state(&self) -> LeadState {
        if self.sent_at.trim().is_empty() {
            match self.send_status() {
                SendStatus::Error(_) => LeadState::Errored,
                _ => LeadState::Pending,
            }
        } else if self.is_flagged() {
            LeadState::FollowupFlagged
        } else {
            LeadState::Sent
        }
    }
}

/// Where a lead is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadState {
    Pending,
    Sent,
    Errored,
    FollowupFlagged,
}

/// Parsed `send_status` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    Empty,
    Ok,
    Error(String),
}

impl SendStatus {
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            SendStatus::Empty
        } else if cell == STATUS_OK {
            SendStatus::Ok
        } else if let Some(rest) = cell.strip_prefix(STATUS_ERROR_PREFIX) {
            SendStatus::Error(rest.trim().to_string())
        } else {
            // Unknown text written by hand; keep it visible as an error.
            SendStatus::Error(cell.to_string())
        }
    }

    /// `Error` from a transport message, truncated for the cell.
    pub fn error(message: &str) -> Self {
        SendStatus::Error(truncate_chars(message, ERROR_MESSAGE_MAX_CHARS).to_string())
    }

    pub fn as_cell(&self) -> String {
        match self {
            SendStatus::Empty => String::new(),
            SendStatus::Ok => STATUS_OK.to_string(),
            SendStatus::Error(msg) => format!("{STATUS_ERROR_PREFIX} {msg}"),
        }
    }
}

// ── Write intents ───────────────────────────────────────────────────

/// A set of system-column writes for one status row.
///
/// Built only through the constructors below, so every update the pipeline
/// issues already respects the system-column policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    fields: BTreeMap<String, String>,
}

impl StatusUpdate {
    /// Failed send: only `send_status` changes.
    pub fn send_failed(message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            status_columns::SEND_STATUS.to_string(),
            SendStatus::error(message).as_cell(),
        );
        Self { fields }
    }

    /// Successful send: all four system columns in one write.
    pub fn sent(sent_at: &str, followup_due_at: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(status_columns::SENT_AT.to_string(), sent_at.to_string());
        fields.insert(status_columns::SEND_STATUS.to_string(), SendStatus::Ok.as_cell());
        fields.insert(
            status_columns::FOLLOWUP_DUE_AT.to_string(),
            followup_due_at.to_string(),
        );
        fields.insert(status_columns::FOLLOWUP_REQUIRED.to_string(), FLAG_NO.to_string());
        Self { fields }
    }

    /// Deadline passed: raise the follow-up flag.
    pub fn followup_flagged() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(status_columns::FOLLOWUP_REQUIRED.to_string(), FLAG_YES.to_string());
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// An actionable lead handed to the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub row: RowId,
    /// Normalized natural key.
    pub email: String,
    /// From the input table; empty for orphaned status rows.
    pub display_name: String,
}
