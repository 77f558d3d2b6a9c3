//! `RecordStore` trait: column-name addressed access to the two lead tables.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::pipeline::types::{RowId, StatusUpdate, TableRow, status_columns};

/// Backend-agnostic tabular store.
///
/// Rows come back in the table's natural order. Writes are restricted to the
/// system-managed status columns; every implementation must call
/// [`check_writable`] before touching the backend.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Header names of `table`, in storage order.
    async fn headers(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Every data row of `table`.
    async fn read_table(&self, table: &str) -> Result<Vec<TableRow>, StoreError>;

    /// Overwrite the given cells of one row.
    async fn write_fields(
        &self,
        table: &str,
        row: RowId,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Return the row whose `key_column` equals `key`, inserting
    /// `defaults` plus the key when it does not exist yet.
    async fn ensure_row_exists(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        defaults: &BTreeMap<String, String>,
    ) -> Result<RowId, StoreError>;

    /// Persist a typed status update.
    async fn apply_update(
        &self,
        table: &str,
        row: RowId,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        self.write_fields(table, row, update.fields()).await
    }
}

/// Reject any write touching a column outside the system-managed set.
pub fn check_writable<'a>(columns: impl IntoIterator<Item = &'a String>) -> Result<(), StoreError> {
    for column in columns {
        if !status_columns::SYSTEM.contains(&column.as_str()) {
            return Err(StoreError::Policy {
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Empty cells for every status column except the key.
pub fn pending_status_defaults() -> BTreeMap<String, String> {
    status_columns::REQUIRED
        .iter()
        .filter(|c| **c != status_columns::EMAIL)
        .map(|c| (c.to_string(), String::new()))
        .collect()
}
