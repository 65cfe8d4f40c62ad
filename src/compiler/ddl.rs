//! DDL rendering for the supported SQL dialects
//!
//! `Derby` reproduces the historical script shape byte for byte so scripts
//! stay compatible with existing databases. `Sqlite` is what the record store
//! executes.

use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::schema::Schema;
use super::diff::MigrationStatement;
use super::physical::{ColumnType, PhysicalColumn, PhysicalTable};

/// Width of every non-key column
pub const TEXT_WIDTH: usize = 1000;

/// Prefix of the shadow table used while rebuilding a SQLite table
const REBUILD_PREFIX: &str = "__rebuild_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Derby,
    #[default]
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Derby => "derby",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Dialect {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "derby" | "javadb" => Ok(Dialect::Derby),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(crate::Error::Config(format!("Unknown SQL dialect: {}", s))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quote an identifier for SQLite
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Name of the foreign-key constraint on `table.column`
pub fn constraint_name(table: &str, column: &str) -> String {
    format!("FK_{}_{}", table, column)
}

/// One `create table` statement per declared table, in declaration order
pub fn create_statements(schema: &Schema, dialect: Dialect) -> Vec<String> {
    schema
        .tables()
        .iter()
        .map(|t| create_table(&PhysicalTable::from_schema(t), dialect))
        .collect()
}

/// The creation script of a whole schema, one statement per line
pub fn generate_create_statements(schema: &Schema, dialect: Dialect) -> String {
    render_lines(create_statements(schema, dialect), dialect)
}

/// Join statements into a script. SQLite statements are rendered without a
/// terminator for execution and get one here.
pub fn render_lines(statements: Vec<String>, dialect: Dialect) -> String {
    let mut script = String::new();
    for statement in statements {
        script.push_str(&statement);
        if dialect == Dialect::Sqlite {
            script.push(';');
        }
        script.push('\n');
    }
    script
}

pub fn create_table(table: &PhysicalTable, dialect: Dialect) -> String {
    match dialect {
        Dialect::Derby => {
            let mut columns = vec![format!(
                "{} integer not null primary key generated always as identity (start with 1, increment by 1)",
                table.identity
            )];
            columns.extend(table.columns.iter().map(|c| format!("{} {}", c.name, derby_type(c))));
            format!("create table {}( {});", table.name, columns.join(", "))
        }
        Dialect::Sqlite => sqlite_create(&table.name, table),
    }
}

fn derby_type(column: &PhysicalColumn) -> String {
    match column.ty {
        ColumnType::Integer if column.not_null => "integer not null".to_string(),
        ColumnType::Integer => "integer".to_string(),
        ColumnType::Text => format!("varchar({})", TEXT_WIDTH),
    }
}

fn sqlite_type(column: &PhysicalColumn) -> String {
    let mut ty = match column.ty {
        ColumnType::Integer if column.not_null => "INTEGER NOT NULL".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::Text => format!("VARCHAR({})", TEXT_WIDTH),
    };
    if let Some(parent) = &column.references {
        ty.push_str(&format!(
            " REFERENCES {}({})",
            quote_ident(parent),
            quote_ident(&crate::schema::identity_column_name(parent))
        ));
    }
    ty
}

fn sqlite_create(name: &str, table: &PhysicalTable) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(&table.identity))];
    columns.extend(
        table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sqlite_type(c))),
    );
    format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", "))
}

/// SQLite cannot alter constraints in place: create the new shape under a
/// shadow name, copy every row, drop the old table, rename the shadow.
fn sqlite_rebuild(shape: &PhysicalTable) -> Vec<String> {
    let shadow = format!("{}{}", REBUILD_PREFIX, shape.name);
    let column_list = std::iter::once(&shape.identity)
        .chain(shape.columns.iter().map(|c| &c.name))
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        sqlite_create(&shadow, shape),
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&shadow),
            column_list,
            column_list,
            quote_ident(&shape.name)
        ),
        format!("DROP TABLE {}", quote_ident(&shape.name)),
        format!("ALTER TABLE {} RENAME TO {}", quote_ident(&shadow), quote_ident(&shape.name)),
    ]
}

impl MigrationStatement {
    /// Render to one or more SQL statements
    pub fn to_sql(&self, dialect: Dialect) -> Vec<String> {
        match (self, dialect) {
            (MigrationStatement::CreateTable(table), _) => vec![create_table(table, dialect)],

            (MigrationStatement::AddColumn { table, column }, Dialect::Derby) => {
                let ty = match column.ty {
                    ColumnType::Integer if column.not_null => "integer not null default 0".to_string(),
                    _ => derby_type(column),
                };
                vec![format!("alter table {} add column {} {};", table, column.name, ty)]
            }
            (MigrationStatement::AddColumn { table, column }, Dialect::Sqlite) => {
                let mut column = column.clone();
                column.references = None;
                let mut ty = sqlite_type(&column);
                if column.not_null {
                    ty.push_str(" DEFAULT 0");
                }
                vec![format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_ident(table),
                    quote_ident(&column.name),
                    ty
                )]
            }

            (MigrationStatement::AddForeignKey { shape, column, parent }, Dialect::Derby) => {
                vec![format!(
                    "alter table {} add constraint {} foreign key ({}) references {}({});",
                    shape.name,
                    constraint_name(&shape.name, column),
                    column,
                    parent,
                    crate::schema::identity_column_name(parent)
                )]
            }
            (MigrationStatement::DropForeignKey { shape, column, .. }, Dialect::Derby) => {
                vec![format!(
                    "alter table {} drop constraint {};",
                    shape.name,
                    constraint_name(&shape.name, column)
                )]
            }
            (MigrationStatement::AddForeignKey { shape, .. }, Dialect::Sqlite)
            | (MigrationStatement::DropForeignKey { shape, .. }, Dialect::Sqlite) => sqlite_rebuild(shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, Relation, SemanticType, TableSchema};

    fn schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new(
                    "REPORT",
                    vec![
                        ColumnDefinition::new("repCountry", SemanticType::Picklist).with_order(0),
                        ColumnDefinition::new("repYear", SemanticType::String).with_order(1),
                    ],
                ),
                TableSchema::new(
                    "CASE",
                    vec![
                        ColumnDefinition::new("REPORTId", SemanticType::ForeignKey),
                        ColumnDefinition::new("sampId", SemanticType::String).with_order(1),
                    ],
                ),
            ],
            vec![Relation::new("REPORT", "CASE")],
        )
        .unwrap()
    }

    #[test]
    fn test_derby_create_shape() {
        let statements = create_statements(&schema(), Dialect::Derby);
        assert_eq!(
            statements[0],
            "create table REPORT( REPORTId integer not null primary key generated always as identity (start with 1, increment by 1), repCountry varchar(1000), repYear varchar(1000));"
        );
        assert_eq!(
            statements[1],
            "create table CASE( CASEId integer not null primary key generated always as identity (start with 1, increment by 1), REPORTId integer not null, sampId varchar(1000));"
        );
    }

    #[test]
    fn test_one_identity_and_one_column_per_field() {
        for sql in create_statements(&schema(), Dialect::Derby) {
            assert_eq!(sql.matches("primary key").count(), 1);
        }
        let case = &create_statements(&schema(), Dialect::Sqlite)[1];
        assert_eq!(case.matches("AUTOINCREMENT").count(), 1);
        assert!(case.contains("\"REPORTId\" INTEGER NOT NULL REFERENCES \"REPORT\"(\"REPORTId\")"));
        assert!(case.contains("\"sampId\" VARCHAR(1000)"));
    }

    #[test]
    fn test_sqlite_script_executes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_create_statements(&schema(), Dialect::Sqlite)).unwrap();
        conn.execute("INSERT INTO \"REPORT\" (\"repYear\") VALUES ('2024')", []).unwrap();
        let id: i64 = conn.query_row("SELECT \"REPORTId\" FROM \"REPORT\"", [], |r| r.get(0)).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_columns_follow_file_order_not_declared_order() {
        let workbook = crate::schema::Workbook::from_toml(
            r#"
[[sheet]]
name = "T"
headers = ["id", "order"]
rows = [["zeta", "2"], ["alpha", "1"]]
"#,
        )
        .unwrap();
        let schema = Schema::from_workbook(&workbook).unwrap();
        let table = schema.table("T").unwrap();
        assert_eq!(table.columns()[0].id, "alpha");
        assert_eq!(
            generate_create_statements(&schema, Dialect::Derby).trim_end(),
            "create table T( TId integer not null primary key generated always as identity (start with 1, increment by 1), zeta varchar(1000), alpha varchar(1000));"
        );
    }

    #[test]
    fn test_dialect_parse() {
        assert_eq!("Derby".parse::<Dialect>().unwrap(), Dialect::Derby);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
