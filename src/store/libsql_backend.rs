//! libSQL implementation of `RecordStore`.
//!
//! Supports local file and in-memory databases. Rows are addressed by
//! SQLite `rowid`; columns by name. Caller-supplied identifiers are validated
//! and quoted before being spliced into SQL; column names read back from the
//! table itself are only escaped. Values are always bound.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::pipeline::types::{RowId, TableRow};
use crate::store::migrations;
use crate::store::traits::{RecordStore, check_writable};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Append a row as an upstream producer would (form import, manual entry).
    ///
    /// Not part of `RecordStore`: the pipeline itself never adds input rows.
    pub async fn append_row(
        &self,
        table: &str,
        cells: &BTreeMap<String, String>,
    ) -> Result<RowId, StoreError> {
        let table_sql = quote_ident(table)?;
        let mut columns = Vec::with_capacity(cells.len());
        let mut values = Vec::with_capacity(cells.len());
        for (column, value) in cells {
            columns.push(quote_ident(column)?);
            values.push(Value::Text(value.clone()));
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO {table_sql} ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders.join(", ")
                ),
                values,
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert into {table}: {e}")))?;

        Ok(RowId(self.conn().last_insert_rowid()))
    }

    /// Find the last row whose key column matches `key` after normalization.
    async fn find_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<RowId>, StoreError> {
        let sql = format!(
            "SELECT rowid FROM {} WHERE lower(trim({})) = lower(trim(?1)) ORDER BY rowid DESC LIMIT 1",
            quote_ident(table)?,
            quote_ident(key_column)?
        );
        let mut rows = self
            .conn()
            .query(&sql, params![key])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to look up key in {table}: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read key lookup: {e}")))?
        {
            Some(row) => {
                let id: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("Failed to parse rowid: {e}")))?;
                Ok(Some(RowId(id)))
            }
            None => Ok(None),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Quote a table/column name after checking it is a plain identifier.
fn quote_ident(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Quote a column name reported by the table itself. Hand-added columns may
/// contain spaces or punctuation, so only embedded quotes are escaped.
fn quote_header(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render any SQLite value as cell text. `NULL` reads as empty.
fn value_to_cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn headers(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table)?);
        let mut rows = self
            .conn()
            .query(&sql, ())
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read headers of {table}: {e}")))?;

        let mut headers = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read header row: {e}")))?
        {
            let name: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("Failed to parse header name: {e}")))?;
            headers.push(name);
        }

        if headers.is_empty() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        Ok(headers)
    }

    async fn read_table(&self, table: &str) -> Result<Vec<TableRow>, StoreError> {
        let headers = self.headers(table).await?;
        let column_list = headers
            .iter()
            .map(|h| quote_header(h))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT rowid, {column_list} FROM {} ORDER BY rowid",
            quote_ident(table)?
        );

        let mut rows = self
            .conn()
            .query(&sql, ())
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read {table}: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read row of {table}: {e}")))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("Failed to parse rowid: {e}")))?;
            let mut table_row = TableRow::new(RowId(id));
            for (i, header) in headers.iter().enumerate() {
                let value = row
                    .get_value(i as i32 + 1)
                    .map_err(|e| StoreError::Query(format!("Failed to read {header}: {e}")))?;
                table_row.cells.insert(header.clone(), value_to_cell(value));
            }
            out.push(table_row);
        }

        debug!(table, rows = out.len(), "Table read");
        Ok(out)
    }

    async fn write_fields(
        &self,
        table: &str,
        row: RowId,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        check_writable(fields.keys())?;
        if fields.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len() + 1);
        for (i, (column, value)) in fields.iter().enumerate() {
            assignments.push(format!("{} = ?{}", quote_ident(column)?, i + 1));
            values.push(Value::Text(value.clone()));
        }
        values.push(Value::Integer(row.0));

        let sql = format!(
            "UPDATE {} SET {} WHERE rowid = ?{}",
            quote_ident(table)?,
            assignments.join(", "),
            values.len()
        );
        let affected = self
            .conn()
            .execute(&sql, values)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to update {table} row {row}: {e}")))?;

        if affected == 0 {
            return Err(StoreError::RowNotFound {
                table: table.to_string(),
                row: row.0,
            });
        }

        info!(
            table,
            row = %row,
            columns = ?fields.keys().collect::<Vec<_>>(),
            "Updated row"
        );
        Ok(())
    }

    async fn ensure_row_exists(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        defaults: &BTreeMap<String, String>,
    ) -> Result<RowId, StoreError> {
        if let Some(existing) = self.find_by_key(table, key_column, key).await? {
            return Ok(existing);
        }

        let mut cells = defaults.clone();
        cells.insert(key_column.to_string(), key.to_string());
        let id = self.append_row(table, &cells).await?;
        debug!(table, row = %id, "Created row");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::StatusUpdate;
    use crate::store::traits::pending_status_defaults;

    const STATUS: &str = "lead_status";

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn cells(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn headers_of_default_tables() {
        let db = test_db().await;
        let headers = db.headers(STATUS).await.unwrap();
        assert_eq!(headers[0], "email");
        assert!(headers.contains(&"followup_completed_at".to_string()));

        let input = db.headers("leads").await.unwrap();
        assert!(input.contains(&"display_name".to_string()));
    }

    #[tokio::test]
    async fn unknown_table_is_an_error() {
        let db = test_db().await;
        let err = db.headers("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(t) if t == "nope"));
    }

    #[tokio::test]
    async fn identifiers_are_validated() {
        let db = test_db().await;
        let err = db.read_table("leads; DROP TABLE leads").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn extra_columns_with_any_name_are_read() {
        let db = test_db().await;
        db.conn()
            .execute_batch(
                r#"ALTER TABLE leads ADD COLUMN "lead source" TEXT;
                   ALTER TABLE leads ADD COLUMN "E-mail" TEXT;
                   ALTER TABLE leads ADD COLUMN "say ""hi""" TEXT;
                   INSERT INTO leads (email, "lead source", "E-mail", "say ""hi""")
                   VALUES ('a@x.com', 'fair', 'old@x.com', 'hello');"#,
            )
            .await
            .unwrap();

        let headers = db.headers("leads").await.unwrap();
        assert!(headers.contains(&"lead source".to_string()));

        let rows = db.read_table("leads").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("email"), "a@x.com");
        assert_eq!(rows[0].get("lead source"), "fair");
        assert_eq!(rows[0].get("E-mail"), "old@x.com");
        assert_eq!(rows[0].get("say \"hi\""), "hello");
    }

    #[tokio::test]
    async fn caller_supplied_column_names_stay_strict() {
        let db = test_db().await;
        let err = db
            .append_row("leads", &cells(&[("lead source", "fair")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(c) if c == "lead source"));
    }

    #[test]
    fn header_quoting_escapes_embedded_quotes() {
        assert_eq!(quote_header("lead source"), "\"lead source\"");
        assert_eq!(quote_header("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn read_table_in_insert_order() {
        let db = test_db().await;
        db.append_row("leads", &cells(&[("email", "b@x.com"), ("display_name", "B")]))
            .await
            .unwrap();
        db.append_row("leads", &cells(&[("email", "a@x.com"), ("display_name", "A")]))
            .await
            .unwrap();

        let rows = db.read_table("leads").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("email"), "b@x.com");
        assert_eq!(rows[1].get("email"), "a@x.com");
        assert_eq!(rows[0].get("secondary_phone"), "");
        assert!(rows[0].id < rows[1].id);
    }

    #[tokio::test]
    async fn ensure_row_exists_is_idempotent() {
        let db = test_db().await;
        let defaults = pending_status_defaults();
        let first = db
            .ensure_row_exists(STATUS, "email", "foo@bar.com", &defaults)
            .await
            .unwrap();
        let second = db
            .ensure_row_exists(STATUS, "email", "foo@bar.com", &defaults)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(db.read_table(STATUS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ensure_row_matches_hand_entered_case() {
        let db = test_db().await;
        let hand = db
            .append_row(STATUS, &cells(&[("email", " Foo@Bar.com")]))
            .await
            .unwrap();
        let found = db
            .ensure_row_exists(STATUS, "email", "foo@bar.com", &pending_status_defaults())
            .await
            .unwrap();
        assert_eq!(found, hand);
    }

    #[tokio::test]
    async fn write_fields_updates_only_named_cells() {
        let db = test_db().await;
        let row = db
            .ensure_row_exists(STATUS, "email", "a@x.com", &pending_status_defaults())
            .await
            .unwrap();

        db.apply_update(STATUS, row, &StatusUpdate::send_failed("SMTP down"))
            .await
            .unwrap();

        let rows = db.read_table(STATUS).await.unwrap();
        assert_eq!(rows[0].get("send_status"), "ERROR: SMTP down");
        assert_eq!(rows[0].get("sent_at"), "");
        assert_eq!(rows[0].get("email"), "a@x.com");
    }

    #[tokio::test]
    async fn write_non_system_column_is_refused() {
        let db = test_db().await;
        let row = db
            .ensure_row_exists(STATUS, "email", "a@x.com", &pending_status_defaults())
            .await
            .unwrap();

        let err = db
            .write_fields(STATUS, row, &cells(&[("email", "evil@x.com")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Policy { .. }));

        let rows = db.read_table(STATUS).await.unwrap();
        assert_eq!(rows[0].get("email"), "a@x.com");
    }

    #[tokio::test]
    async fn write_missing_row_is_an_error() {
        let db = test_db().await;
        let err = db
            .apply_update(STATUS, RowId(99), &StatusUpdate::followup_flagged())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { row: 99, .. }));
    }

    #[tokio::test]
    async fn null_cells_read_as_empty() {
        let db = test_db().await;
        db.conn()
            .execute_batch(
                "CREATE TABLE sheet (email TEXT, note TEXT);
                 INSERT INTO sheet (email, note) VALUES ('a@x.com', NULL);",
            )
            .await
            .unwrap();
        let rows = db.read_table("sheet").await.unwrap();
        assert_eq!(rows[0].get("note"), "");
    }

    #[tokio::test]
    async fn local_file_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("leads.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.ensure_row_exists(STATUS, "email", "a@x.com", &pending_status_defaults())
                .await
                .unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.read_table(STATUS).await.unwrap().len(), 1);
    }
}
