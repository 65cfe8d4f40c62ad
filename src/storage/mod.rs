//! Storage Layer - SQLite-backed persistence
//!
//! Tables are created from the compiled schema, one per declared table:
//! - `<table>Id` auto-incrementing identity
//! - one column per declared field, foreign keys as integers
//!
//! [`RecordStore`] is the only way records reach storage.

pub mod record_store;
pub mod sqlite;

pub use record_store::{RecordStore, Source};
pub use sqlite::{Atomicity, Database, DbStats, StoreConfig, Strictness, UnitOfWork};
