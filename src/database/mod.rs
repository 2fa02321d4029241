// Relational metadata lives in SQLite, chunk embeddings in LanceDB

pub mod lancedb;
pub mod sqlite;

pub use sqlite::*;
