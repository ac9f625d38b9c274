//! Persistence layer: libSQL-backed settings, users, sessions and generations.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, StoredGeneration, StoredSession, StoredUser};
