//! Header validation, run before any write of a pass.

use crate::error::{Result, SchemaError};
use crate::pipeline::types::{input_columns, status_columns};
use crate::store::RecordStore;

/// Check that `headers` contain every name in `required`.
pub fn validate_headers(
    table: &str,
    headers: &[String],
    required: &[&str],
) -> std::result::Result<(), SchemaError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingColumns {
            table: table.to_string(),
            missing,
            found: headers.to_vec(),
        })
    }
}

/// Validate the input table layout.
pub async fn check_input_layout(store: &dyn RecordStore, table: &str) -> Result<()> {
    let headers = store.headers(table).await?;
    validate_headers(table, &headers, input_columns::REQUIRED)?;
    Ok(())
}

/// Validate the status table layout.
pub async fn check_status_layout(store: &dyn RecordStore, table: &str) -> Result<()> {
    let headers = store.headers(table).await?;
    validate_headers(table, &headers, status_columns::REQUIRED)?;
    Ok(())
}
