//! Persistence layer: the two lead tables behind a `RecordStore`.

pub mod libsql_backend;
pub mod migrations;
pub mod schema;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::RecordStore;
