//! Schema Compiler - definitions to DDL, and additive migrations between versions
//!
//! - [`ddl`]: `create table` scripts for the Derby and SQLite dialects
//! - [`physical`]: the physical structure a schema maps to, or a database holds
//! - [`diff`]: migration statements from one structure to a newer schema
//! - [`migrate`]: sequential execution of those statements

pub mod ddl;
pub mod diff;
pub mod migrate;
pub mod physical;

pub use ddl::{create_statements, generate_create_statements, quote_ident, Dialect};
pub use diff::{diff, diff_schemas, MigrationStatement};
pub use migrate::{apply_script, MigrationReport};
pub use physical::{ColumnType, PhysicalColumn, PhysicalSchema, PhysicalTable};
