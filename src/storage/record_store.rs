//! Record Store - CRUD over records of one runtime-declared table
//!
//! Statements are built from the table schema at construction. Parameters are
//! always bound in column id order, never in declared order.
//!
//! Storage errors follow the configured [`Strictness`]: lenient stores log them
//! and return a neutral value, strict stores return them. Structural errors
//! (unknown relation, unsaved record) are always returned.

use std::sync::Arc;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use crate::catalog::Catalog;
use crate::compiler::quote_ident;
use crate::record::{CellValue, Record};
use crate::schema::{identity_column_name, ColumnKey, TableSchema};
use crate::{Error, Result};
use super::sqlite::{Database, StoreConfig, Strictness};

/// Where a store gets its connection from
#[derive(Clone, Copy)]
pub enum Source<'a> {
    /// Open a connection per call
    Database(&'a Database),
    /// Borrow the connection of a unit of work
    Connection(&'a Connection, &'a StoreConfig),
}

impl Source<'_> {
    fn config(&self) -> &StoreConfig {
        match self {
            Source::Database(db) => db.config(),
            Source::Connection(_, config) => config,
        }
    }
}

/// Generic data access object for one table
pub struct RecordStore<'a> {
    schema: Arc<TableSchema>,
    source: Source<'a>,
    catalog: &'a dyn Catalog,
    strictness: Strictness,
    /// Declared columns in id order
    binding: Vec<ColumnKey>,
    select_sql: String,
}

impl<'a> RecordStore<'a> {
    pub fn new(schema: Arc<TableSchema>, source: Source<'a>, catalog: &'a dyn Catalog) -> Self {
        let binding: Vec<ColumnKey> = schema.binding_keys().collect();
        let columns = std::iter::once(quote_ident(schema.identity_column()))
            .chain(binding.iter().map(|k| quote_ident(schema.column_name(*k))))
            .collect::<Vec<_>>()
            .join(", ");
        let select_sql = format!("SELECT {} FROM {}", columns, quote_ident(schema.name()));

        Self {
            strictness: source.config().strictness,
            schema,
            source,
            catalog,
            binding,
            select_sql,
        }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.name()
    }

    fn with_conn<T>(&self, work: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        match self.source {
            Source::Database(db) => {
                let conn = db.connect()?;
                work(&conn)
            }
            Source::Connection(conn, _) => work(conn),
        }
    }

    /// Apply the strictness policy to a storage result
    fn recover<T>(&self, operation: &str, result: Result<T>, neutral: T) -> Result<T> {
        match result {
            Err(Error::Storage(e)) if self.strictness == Strictness::Lenient => {
                tracing::error!("{} on {} failed: {}", operation, self.table(), e);
                Ok(neutral)
            }
            other => other,
        }
    }

    fn check_table(&self, record: &Record) -> Result<()> {
        if record.table() != self.table() {
            return Err(Error::UnknownTable(format!(
                "{} (record passed to the {} store)",
                record.table(),
                self.table()
            )));
        }
        Ok(())
    }

    /// Columns and parameters for a write, in binding order. Foreign keys bind
    /// as integers; one that does not parse is skipped. Other columns bind
    /// their code, or their label when the code is empty.
    fn bind(&self, record: &Record) -> (Vec<String>, Vec<Value>) {
        let mut columns = Vec::with_capacity(self.binding.len());
        let mut values = Vec::with_capacity(self.binding.len());

        for key in &self.binding {
            let Some(definition) = self.schema.definition(*key) else { continue };
            let cell = record.get_key(*key);

            let value = if definition.is_foreign_key() {
                match cell.map(|c| c.code.trim().parse::<i64>()) {
                    Some(Ok(id)) => Value::Integer(id),
                    _ => {
                        tracing::warn!(
                            "{}.{}: foreign key {:?} is not an integer, column skipped",
                            self.table(),
                            definition.id,
                            cell.map(|c| c.code.as_str())
                        );
                        continue;
                    }
                }
            } else {
                match cell {
                    Some(cell) => Value::Text(cell.stored_text().to_string()),
                    None => Value::Null,
                }
            };

            columns.push(quote_ident(&definition.id));
            values.push(value);
        }

        (columns, values)
    }

    /// Insert a record; its new identity is set on the record and returned
    pub fn add(&self, record: &mut Record) -> Result<Option<i64>> {
        self.check_table(record)?;
        let (columns, values) = self.bind(record);
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(self.table()))
        } else {
            let placeholders = (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(self.table()),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let result = self.with_conn(|conn| {
            tracing::debug!("{}", sql);
            conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(Some(conn.last_insert_rowid()))
        });

        let id = self.recover("insert", result, None)?;
        if let Some(id) = id {
            record.set_id(id);
        }
        Ok(id)
    }

    /// Rewrite every declared column of a stored record
    pub fn update(&self, record: &Record) -> Result<bool> {
        self.check_table(record)?;
        let id = record.saved_id()?;
        let (columns, mut values) = self.bind(record);
        if columns.is_empty() {
            return Ok(true);
        }

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect::<Vec<_>>();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(self.table()),
            assignments.join(", "),
            quote_ident(self.schema.identity_column()),
            columns.len() + 1
        );
        values.push(Value::Integer(id));

        let result = self.with_conn(|conn| {
            tracing::debug!("{}", sql);
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed > 0)
        });
        self.recover("update", result, false)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!("{} WHERE {} = ?1", self.select_sql, quote_ident(self.schema.identity_column()));
        let result = self.with_conn(|conn| {
            conn.query_row(&sql, [id], |row| self.hydrate(row))
                .optional()
                .map_err(Into::into)
        });
        self.recover("get by id", result, None)
    }

    /// Every row, in identity order
    pub fn get_all(&self) -> Result<Vec<Record>> {
        let sql = format!("{} ORDER BY {}", self.select_sql, quote_ident(self.schema.identity_column()));
        let result = self.with_conn(|conn| self.query(conn, &sql, None));
        self.recover("get all", result, Vec::new())
    }

    /// Rows whose `<parent_table>Id` column equals `parent_id`, in identity order
    pub fn get_by_parent_id(&self, parent_table: &str, parent_id: i64) -> Result<Vec<Record>> {
        let column = self.parent_column(parent_table)?;
        let sql = format!(
            "{} WHERE {} = ?1 ORDER BY {}",
            self.select_sql,
            quote_ident(&column),
            quote_ident(self.schema.identity_column())
        );
        let result = self.with_conn(|conn| self.query(conn, &sql, Some(parent_id)));
        self.recover("get by parent id", result, Vec::new())
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(self.table()));
        let result = self.with_conn(|conn| {
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as usize)
        });
        self.recover("count", result, 0)
    }

    /// Delete every row of the table
    pub fn remove_all(&self) -> Result<bool> {
        let sql = format!("DELETE FROM {}", quote_ident(self.table()));
        self.execute("remove all", &sql, None).map(|r| r.is_some())
    }

    /// Delete the rows of one parent. Nothing cascades beyond this table.
    pub fn remove_by_parent_id(&self, parent_table: &str, parent_id: i64) -> Result<bool> {
        let column = self.parent_column(parent_table)?;
        let sql = format!("DELETE FROM {} WHERE {} = ?1", quote_ident(self.table()), quote_ident(&column));
        self.execute("remove by parent id", &sql, Some(parent_id)).map(|r| r.is_some())
    }

    /// Delete one row; `true` when a row was deleted
    pub fn delete(&self, id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(self.table()),
            quote_ident(self.schema.identity_column())
        );
        self.execute("delete", &sql, Some(id)).map(|r| r.is_some_and(|n| n > 0))
    }

    /// Execute a statement, returning the changed row count or `None` when recovered
    fn execute(&self, operation: &str, sql: &str, param: Option<i64>) -> Result<Option<usize>> {
        let result = self.with_conn(|conn| {
            tracing::debug!("{}", sql);
            let changed = match param {
                Some(p) => conn.execute(sql, [p])?,
                None => conn.execute(sql, [])?,
            };
            Ok(Some(changed))
        });
        self.recover(operation, result, None)
    }

    /// Foreign-key column pointing at `parent_table`
    fn parent_column(&self, parent_table: &str) -> Result<String> {
        if let Some(relation) = self.schema.relation_to_parent(parent_table) {
            return Ok(relation.foreign_key_column());
        }
        let column = identity_column_name(parent_table);
        if self.schema.is_foreign_key(&column) {
            return Ok(column);
        }
        Err(Error::UnknownRelation {
            parent: parent_table.to_string(),
            child: self.table().to_string(),
        })
    }

    fn query(&self, conn: &Connection, sql: &str, param: Option<i64>) -> Result<Vec<Record>> {
        tracing::debug!("{}", sql);
        let mut stmt = conn.prepare(sql)?;
        let rows = match param {
            Some(p) => stmt.query_map([p], |row| self.hydrate(row))?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], |row| self.hydrate(row))?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    /// Helper to convert a row to a Record
    fn hydrate(&self, row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let mut record = Record::new(self.schema.clone());
        record.set_id(row.get(0)?);

        for (i, key) in self.binding.iter().enumerate() {
            let Some(definition) = self.schema.definition(*key) else { continue };
            let Some(raw) = text_of(row.get_ref(i + 1)?) else { continue };

            let value = if definition.is_picklist() {
                if raw.is_empty() {
                    CellValue::empty()
                } else {
                    let label = definition
                        .picklist_key
                        .as_deref()
                        .and_then(|key| self.catalog.resolve_label(key, &raw))
                        .filter(|label| !label.is_empty())
                        .unwrap_or_else(|| raw.clone());
                    CellValue::new(raw, label)
                }
            } else {
                CellValue::text(raw)
            };
            record.put_key(*key, value);
        }

        Ok(record)
    }
}

/// Raw cell text; `None` for SQL NULL
fn text_of(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}
