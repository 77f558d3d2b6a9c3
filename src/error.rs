//! Error types for lead-ack.

use std::path::PathBuf;

/// Top-level error type for a pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Attachment {key} not found: {}", path.display())]
    AttachmentNotFound { key: String, path: PathBuf },
}

/// Record store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Row {row} not found in table {table}")]
    RowNotFound { table: String, row: i64 },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Attempt to write a column the system does not own.
    #[error("Refusing to write non-system column: {column}")]
    Policy { column: String },
}

/// Header layout mismatch between a table and what the pass expects.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Table {table} is missing required columns {missing:?} (found {found:?})")]
    MissingColumns {
        table: String,
        missing: Vec<String>,
        found: Vec<String>,
    },
}

/// Outbound transport errors. Recorded per lead, never fatal for the pass.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Attachment not found: {}", .0.display())]
    AttachmentMissing(PathBuf),

    #[error("Failed to read attachment {}: {reason}", path.display())]
    AttachmentRead { path: PathBuf, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),

    #[error("Send task aborted: {0}")]
    Task(String),
}

/// Errors escaping a single lead's lifecycle step.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The notification went out but the OK status could not be stored.
    /// The lead is still actionable, so the next run may send it again.
    #[error("Notification delivered to row {row} but status was not recorded: {source}")]
    DeliveredButNotRecorded {
        row: i64,
        #[source]
        source: StoreError,
    },

    #[error("Failed to record send error for row {row}: {source}")]
    ErrorNotRecorded {
        row: i64,
        #[source]
        source: StoreError,
    },

    #[error("Invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
}

/// Message template validation errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Calendar link must not be empty")]
    EmptyCalendarLink,

    #[error("Expected exactly {expected} attachments, got {actual}")]
    AttachmentCount { expected: usize, actual: usize },
}

/// Result type alias for lead-ack.
pub type Result<T> = std::result::Result<T, Error>;
