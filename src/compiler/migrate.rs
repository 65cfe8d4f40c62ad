//! Sequential, best-effort execution of migration scripts

use rusqlite::Connection;
use crate::{Error, Result};
use super::ddl::Dialect;
use super::diff::MigrationStatement;

/// Outcome of a successful script run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Migration statements applied
    pub statements: usize,
    /// SQL statements executed
    pub executed: usize,
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} migration statements ({} SQL statements)", self.statements, self.executed)
    }
}

/// Execute statements in order against SQLite. The first failing SQL
/// statement aborts the rest of the script; statements already executed stay
/// applied unless the caller wrapped the run in a transaction.
pub fn apply_script(conn: &Connection, statements: &[MigrationStatement]) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();
    let mut index = 0;

    for statement in statements {
        tracing::info!("Migrating: {}", statement);
        for sql in statement.to_sql(Dialect::Sqlite) {
            tracing::debug!("Executing [{}]: {}", index, sql);
            if let Err(source) = conn.execute(&sql, []) {
                tracing::error!("Migration aborted at statement {}: {}", index, source);
                return Err(Error::Migration {
                    index,
                    statement: sql,
                    source,
                });
            }
            index += 1;
            report.executed += 1;
        }
        report.statements += 1;
    }

    Ok(report)
}
