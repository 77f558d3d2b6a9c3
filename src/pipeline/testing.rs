//! In-memory doubles for pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;

use crate::error::{NotifyError, StoreError};
use crate::notify::{Notifier, OutgoingEmail};
use crate::pipeline::timestamps::normalize_email;
use crate::pipeline::types::{RowId, TableRow, input_columns, status_columns};
use crate::store::RecordStore;
use crate::store::traits::check_writable;

pub const INPUT: &str = "leads";
pub const STATUS: &str = "lead_status";

struct Table {
    headers: Vec<String>,
    rows: Vec<TableRow>,
}

/// `RecordStore` over plain vectors. Records every write; can be told to
/// fail writes.
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<(RowId, BTreeMap<String, String>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        for (name, headers) in [
            (INPUT, input_columns::REQUIRED),
            (STATUS, status_columns::REQUIRED),
        ] {
            tables.insert(
                name.to_string(),
                Table {
                    headers: headers.iter().map(|h| h.to_string()).collect(),
                    rows: Vec::new(),
                },
            );
        }
        Self {
            tables: Mutex::new(tables),
            next_id: AtomicI64::new(1),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Replace a table's header row.
    pub fn set_headers(&self, table: &str, headers: &[&str]) {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.to_string()).or_insert(Table {
            headers: Vec::new(),
            rows: Vec::new(),
        });
        entry.headers = headers.iter().map(|h| h.to_string()).collect();
    }

    pub fn push(&self, table: &str, cells: &[(&str, &str)]) -> RowId {
        let id = RowId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let row = cells
            .iter()
            .fold(TableRow::new(id), |row, (col, val)| row.with(col, *val));
        self.tables
            .lock()
            .unwrap()
            .get_mut(table)
            .unwrap()
            .rows
            .push(row);
        id
    }

    pub fn row(&self, table: &str, id: RowId) -> TableRow {
        self.tables.lock().unwrap()[table]
            .rows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }

    pub fn rows(&self, table: &str) -> Vec<TableRow> {
        self.tables.lock().unwrap()[table].rows.clone()
    }

    pub fn writes(&self) -> Vec<(RowId, BTreeMap<String, String>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn headers(&self, table: &str) -> Result<Vec<String>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.headers.clone())
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    async fn read_table(&self, table: &str) -> Result<Vec<TableRow>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    async fn write_fields(
        &self,
        table: &str,
        row: RowId,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        check_writable(fields.keys())?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("disk I/O error".into()));
        }
        let mut tables = self.tables.lock().unwrap();
        let target = tables
            .get_mut(table)
            .and_then(|t| t.rows.iter_mut().find(|r| r.id == row))
            .ok_or_else(|| StoreError::RowNotFound {
                table: table.to_string(),
                row: row.0,
            })?;
        for (col, val) in fields {
            target.cells.insert(col.clone(), val.clone());
        }
        self.writes.lock().unwrap().push((row, fields.clone()));
        Ok(())
    }

    async fn ensure_row_exists(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        defaults: &BTreeMap<String, String>,
    ) -> Result<RowId, StoreError> {
        let wanted = normalize_email(key);
        let existing = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?
            .rows
            .iter()
            .rev()
            .find(|r| normalize_email(r.get(key_column)) == wanted)
            .map(|r| r.id);
        if let Some(id) = existing {
            return Ok(id);
        }
        let mut cells: Vec<(&str, &str)> = defaults
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        cells.push((key_column, key));
        Ok(self.push(table, &cells))
    }
}

/// Notifier that records every attempt and fails for chosen recipients.
#[derive(Default)]
pub struct StubNotifier {
    failing: HashSet<String>,
    fail_all: bool,
    attempts: Mutex<Vec<OutgoingEmail>>,
}

impl StubNotifier {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_all() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<OutgoingEmail> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.attempts().into_iter().map(|e| e.to).collect()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(email.clone());
        if self.fail_all || self.failing.contains(&email.to) {
            return Err(NotifyError::Send("connection refused".into()));
        }
        Ok(())
    }
}
