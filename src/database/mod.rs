// Storage layer: LanceDB for the tenant-scoped vector index, SQLite for the task queue

pub mod lancedb;
pub mod sqlite;

pub use sqlite::*;
