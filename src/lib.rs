//! # Recordtree - Schema-driven hierarchical record engine
//!
//! Tables, columns and parent/child relations are declared at runtime in a
//! definition workbook. Recordtree provides:
//! - A schema model and a compiler from definitions to DDL and additive migrations
//! - A generic record store over dynamically shaped SQLite tables
//! - A relation cache for parent lookups owned by a [`Session`]
//! - A hierarchy flattener that exports a record tree as flat, ancestor-enriched rows
//! - A version cloner that amends a report by deep-copying its whole tree

pub mod schema;
pub mod compiler;
pub mod record;
pub mod catalog;
pub mod formula;
pub mod storage;
pub mod relation_cache;
pub mod session;
pub mod export;
pub mod version;
pub mod kinds;
pub mod amend;
pub mod import;
pub mod worker;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use schema::{ColumnDefinition, ColumnKey, Relation, Schema, SemanticType, TableSchema};
pub use record::{CellValue, Record};
pub use storage::{Atomicity, Database, RecordStore, StoreConfig, Strictness};
pub use session::Session;
pub use version::Version;

/// Result type alias for Recordtree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Recordtree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Definition error: {0}")]
    Definition(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid value {value:?} for column {column}")]
    InvalidValue { column: String, value: String },

    #[error("No relation from {parent} to {child}")]
    UnknownRelation { parent: String, child: String },

    #[error("Record of table {0} has not been stored yet")]
    UnsavedRecord(String),

    #[error("Migration statement {index} failed ({statement}): {source}")]
    Migration {
        index: usize,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Amend failed: {0}")]
    Amend(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Job {0} panicked")]
    Job(String),

    #[error("Invalid version token: {0}")]
    Version(String),

    #[error("Config error: {0}")]
    Config(String),
}
