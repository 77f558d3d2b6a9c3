//! Lead pipeline.
//!
//! An acknowledgement pass runs:
//! 1. `reconcile()`: match input rows to status rows by normalized email
//! 2. `RecordStore::ensure_row_exists()` for every new key, then reconcile again
//! 3. `LifecycleEngine::process()` for each actionable lead: one send, one write
//!
//! The follow-up pass is independent and reads only the status table.

pub mod followup;
pub mod lifecycle;
pub mod reconcile;
pub mod runner;
pub mod timestamps;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
