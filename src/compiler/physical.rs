//! Physical table structure, as declared by a schema or found in a database

use rusqlite::Connection;
use crate::schema::{ColumnDefinition, Schema, TableSchema};
use crate::Result;
use super::ddl::quote_ident;
use super::diff::MigrationStatement;

/// Storage class of a physical column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Foreign keys and identities
    Integer,
    /// Every other column, bounded to [`TEXT_WIDTH`](super::ddl::TEXT_WIDTH)
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalColumn {
    pub name: String,
    pub ty: ColumnType,
    pub not_null: bool,
    /// Parent table of a foreign-key constraint on this column
    pub references: Option<String>,
}

impl PhysicalColumn {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Text,
            not_null: false,
            references: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Integer,
            not_null: true,
            references: None,
        }
    }

    /// Physical form of a declared column, with its constraint when a relation backs it
    pub fn from_definition(definition: &ColumnDefinition, table: &TableSchema) -> Self {
        if definition.is_foreign_key() {
            let mut column = Self::integer(&definition.id);
            column.references = table.foreign_key_target(&definition.id).map(str::to_string);
            column
        } else {
            Self::text(&definition.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalTable {
    pub name: String,
    /// Auto-incrementing primary key column
    pub identity: String,
    /// Data columns in creation order
    pub columns: Vec<PhysicalColumn>,
}

impl PhysicalTable {
    pub fn from_schema(table: &TableSchema) -> Self {
        Self {
            name: table.name().to_string(),
            identity: table.identity_column().to_string(),
            columns: table
                .file_ordered_columns()
                .map(|c| PhysicalColumn::from_definition(c, table))
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&PhysicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut PhysicalColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

/// The set of physical tables of one database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalSchema {
    tables: Vec<PhysicalTable>,
}

impl PhysicalSchema {
    pub fn new(tables: Vec<PhysicalTable>) -> Self {
        Self { tables }
    }

    /// The structure a schema creates on an empty database
    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            tables: schema
                .tables()
                .iter()
                .map(|t| PhysicalTable::from_schema(t))
                .collect(),
        }
    }

    pub fn tables(&self) -> &[PhysicalTable] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&PhysicalTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut PhysicalTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    fn replace(&mut self, shape: &PhysicalTable) {
        match self.get_mut(&shape.name) {
            Some(table) => *table = shape.clone(),
            None => self.tables.push(shape.clone()),
        }
    }

    /// Apply one migration statement to this structure in memory
    pub fn apply(&mut self, statement: &MigrationStatement) {
        match statement {
            MigrationStatement::CreateTable(table) => {
                if self.get(&table.name).is_none() {
                    self.tables.push(table.clone());
                }
            }
            MigrationStatement::AddColumn { table, column } => {
                if let Some(existing) = self.get_mut(table) {
                    if existing.column(&column.name).is_none() {
                        existing.columns.push(column.clone());
                    }
                }
            }
            MigrationStatement::AddForeignKey { shape, .. }
            | MigrationStatement::DropForeignKey { shape, .. } => self.replace(shape),
        }
    }

    pub fn apply_all<'a>(&mut self, statements: impl IntoIterator<Item = &'a MigrationStatement>) {
        for statement in statements {
            self.apply(statement);
        }
    }

    /// Read the structure of every user table of a SQLite database
    pub fn introspect(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(introspect_table(conn, &name)?);
        }
        Ok(Self { tables })
    }
}

fn introspect_table(conn: &Connection, name: &str) -> Result<PhysicalTable> {
    let mut references: Vec<(String, String)> = Vec::new();
    let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(name)))?;
    // id, seq, table, from, to, on_update, on_delete, match
    let rows = fk_stmt.query_map([], |row| Ok((row.get::<_, String>(3)?, row.get::<_, String>(2)?)))?;
    for row in rows {
        references.push(row?);
    }

    let mut info_stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
    // cid, name, type, notnull, dflt_value, pk
    let rows = info_stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(5)?,
        ))
    })?;

    let mut identity = None;
    let mut columns = Vec::new();
    for row in rows {
        let (column, declared_type, not_null, pk) = row?;
        if pk > 0 && identity.is_none() {
            identity = Some(column);
            continue;
        }
        let ty = if declared_type.to_uppercase().contains("INT") {
            ColumnType::Integer
        } else {
            ColumnType::Text
        };
        let references = references
            .iter()
            .find(|(from, _)| *from == column)
            .map(|(_, parent)| parent.clone());
        columns.push(PhysicalColumn {
            name: column,
            ty,
            not_null: not_null != 0,
            references,
        });
    }

    Ok(PhysicalTable {
        identity: identity.unwrap_or_else(|| crate::schema::identity_column_name(name)),
        name: name.to_string(),
        columns,
    })
}
