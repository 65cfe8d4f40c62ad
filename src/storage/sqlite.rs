//! SQLite database handle, store settings and units of work

use std::path::{Path, PathBuf};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use crate::compiler::{self, MigrationReport, MigrationStatement, PhysicalSchema};
use crate::schema::Schema;
use crate::Result;
use super::record_store::Source;

/// What the record store does with a storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Log the error and return a neutral value (`None`, `false`, empty)
    #[default]
    Lenient,
    /// Return the error to the caller
    Strict,
}

/// Failure behavior of multi-row operations (amend, import, migration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Atomicity {
    /// Every statement commits on its own; a failure leaves earlier writes in place
    #[default]
    PartialWriteStands,
    /// The whole operation commits at the end or rolls back on failure
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub strictness: Strictness,
    pub atomicity: Atomicity,
    /// Enforce foreign-key constraints on record connections
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            atomicity: Atomicity::PartialWriteStands,
            foreign_keys: true,
        }
    }
}

/// Handle to a SQLite database file.
///
/// Holds no connection: each record store call opens one, executes, and
/// closes it, unless it runs inside a [`UnitOfWork`].
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    config: StoreConfig,
}

impl Database {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
            config,
        };
        db.connect()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a new connection for record operations
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(if self.config.foreign_keys {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        })?;
        Ok(conn)
    }

    /// Structural changes rebuild tables, which needs constraints off
    fn connect_for_migration(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        Ok(conn)
    }

    /// Read the current physical structure
    pub fn physical_schema(&self) -> Result<PhysicalSchema> {
        let conn = self.connect_for_migration()?;
        PhysicalSchema::introspect(&conn)
    }

    /// Statements that would bring this database up to `schema`
    pub fn plan(&self, schema: &Schema) -> Result<Vec<MigrationStatement>> {
        Ok(compiler::diff(&self.physical_schema()?, schema))
    }

    /// Create missing tables and apply additive migrations toward `schema`
    pub fn migrate(&self, schema: &Schema) -> Result<MigrationReport> {
        let statements = self.plan(schema)?;
        self.apply(&statements)
    }

    /// Run a migration script under the configured atomicity
    pub fn apply(&self, statements: &[MigrationStatement]) -> Result<MigrationReport> {
        if statements.is_empty() {
            tracing::debug!("Database {} is up to date", self.path.display());
            return Ok(MigrationReport::default());
        }
        let conn = self.connect_for_migration()?;
        let unit = UnitOfWork::begin(conn, self.config)?;
        let result = compiler::apply_script(unit.connection(), statements);
        unit.finish(result)
    }

    /// Run `work` with one connection lent to every store it creates
    pub fn unit_of_work<T>(&self, work: impl FnOnce(&UnitOfWork) -> Result<T>) -> Result<T> {
        let unit = UnitOfWork::begin(self.connect()?, self.config)?;
        let result = work(&unit);
        unit.finish(result)
    }

    /// Row counts of every table of `schema`
    pub fn stats(&self, schema: &Schema) -> Result<DbStats> {
        let conn = self.connect()?;
        let mut tables = Vec::new();
        for table in schema.tables() {
            let sql = format!("SELECT COUNT(*) FROM {}", compiler::quote_ident(table.name()));
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            tables.push((table.name().to_string(), count as usize));
        }
        Ok(DbStats { tables })
    }
}

/// One connection shared by a multi-row operation
pub struct UnitOfWork {
    conn: Connection,
    config: StoreConfig,
}

impl UnitOfWork {
    fn begin(conn: Connection, config: StoreConfig) -> Result<Self> {
        if config.atomicity == Atomicity::AllOrNothing {
            conn.execute_batch("BEGIN TRANSACTION")?;
        }
        Ok(Self { conn, config })
    }

    fn finish<T>(self, result: Result<T>) -> Result<T> {
        if self.config.atomicity == Atomicity::PartialWriteStands {
            return result;
        }
        match result {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Rolling back unit of work: {}", e);
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn source(&self) -> Source<'_> {
        Source::Connection(&self.conn, &self.config)
    }
}

/// Database statistics
#[derive(Debug, Clone, Default)]
pub struct DbStats {
    pub tables: Vec<(String, usize)>,
}

impl DbStats {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|(name, _)| name == table).map(|(_, n)| *n)
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (name, rows) in &self.tables {
            writeln!(f, "  {}: {}", name, rows)?;
        }
        Ok(())
    }
}
