//! Schema diff - additive migrations between two schema versions
//!
//! Migrations only ever add: new tables, new columns, new constraints.
//! Columns are never dropped; when a column stops being a foreign key only
//! its constraint goes, the column and its data stay.

use crate::schema::Schema;
use super::physical::{PhysicalColumn, PhysicalSchema, PhysicalTable};

/// One structural change produced by [`diff`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatement {
    CreateTable(PhysicalTable),
    AddColumn {
        table: String,
        column: PhysicalColumn,
    },
    /// `shape` is the whole table after the constraint is added
    AddForeignKey {
        shape: PhysicalTable,
        column: String,
        parent: String,
    },
    /// `shape` is the whole table after the constraint is dropped
    DropForeignKey {
        shape: PhysicalTable,
        column: String,
        parent: String,
    },
}

impl MigrationStatement {
    pub fn table_name(&self) -> &str {
        match self {
            MigrationStatement::CreateTable(table) => &table.name,
            MigrationStatement::AddColumn { table, .. } => table,
            MigrationStatement::AddForeignKey { shape, .. }
            | MigrationStatement::DropForeignKey { shape, .. } => &shape.name,
        }
    }
}

impl std::fmt::Display for MigrationStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationStatement::CreateTable(table) => write!(f, "create table {}", table.name),
            MigrationStatement::AddColumn { table, column } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            MigrationStatement::AddForeignKey { shape, column, parent } => {
                write!(f, "add foreign key {}.{} -> {}", shape.name, column, parent)
            }
            MigrationStatement::DropForeignKey { shape, column, parent } => {
                write!(f, "drop foreign key {}.{} -> {}", shape.name, column, parent)
            }
        }
    }
}

/// Statements that bring the physical structure `old` up to schema `new`.
///
/// Tables are visited in `new`'s declaration order, columns in file order.
pub fn diff(old: &PhysicalSchema, new: &Schema) -> Vec<MigrationStatement> {
    let mut result = Vec::new();

    for table in new.tables() {
        let Some(existing) = old.get(table.name()) else {
            result.push(MigrationStatement::CreateTable(PhysicalTable::from_schema(table)));
            continue;
        };

        let mut shape = existing.clone();
        for definition in table.file_ordered_columns() {
            let target = table.foreign_key_target(&definition.id).map(str::to_string);

            let Some(current) = shape.column(&definition.id).cloned() else {
                let mut column = PhysicalColumn::from_definition(definition, table);
                column.references = None;
                shape.columns.push(column.clone());
                result.push(MigrationStatement::AddColumn {
                    table: table.name().to_string(),
                    column,
                });

                if definition.is_foreign_key() {
                    match target {
                        Some(parent) => {
                            set_reference(&mut shape, &definition.id, Some(&parent));
                            result.push(MigrationStatement::AddForeignKey {
                                shape: shape.clone(),
                                column: definition.id.clone(),
                                parent,
                            });
                        }
                        None => tracing::warn!(
                            "Foreign key column {}.{} has no declared relation, added without constraint",
                            table.name(),
                            definition.id
                        ),
                    }
                }
                continue;
            };

            match (current.references, target) {
                (Some(parent), None) => {
                    set_reference(&mut shape, &definition.id, None);
                    result.push(MigrationStatement::DropForeignKey {
                        shape: shape.clone(),
                        column: definition.id.clone(),
                        parent,
                    });
                }
                (None, Some(parent)) => {
                    set_reference(&mut shape, &definition.id, Some(&parent));
                    result.push(MigrationStatement::AddForeignKey {
                        shape: shape.clone(),
                        column: definition.id.clone(),
                        parent,
                    });
                }
                _ => {}
            }
        }
    }

    result
}

/// Diff two declared schemas, treating `old` as already applied
pub fn diff_schemas(old: &Schema, new: &Schema) -> Vec<MigrationStatement> {
    diff(&PhysicalSchema::from_schema(old), new)
}

fn set_reference(shape: &mut PhysicalTable, column: &str, parent: Option<&str>) {
    if let Some(column) = shape.column_mut(column) {
        column.references = parent.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, Relation, SemanticType, TableSchema};

    fn col(id: &str, ty: SemanticType, order: i64) -> ColumnDefinition {
        ColumnDefinition::new(id, ty).with_order(order)
    }

    fn old_schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new("Settings", vec![col("country", SemanticType::String, 0)]),
                TableSchema::new("Report", vec![col("SettingsId", SemanticType::ForeignKey, 0)]),
                TableSchema::new("Case", vec![col("sampId", SemanticType::String, 0)]),
            ],
            vec![Relation::new("Settings", "Report")],
        )
        .unwrap()
    }

    fn new_schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new("Settings", vec![col("country", SemanticType::String, 0)]),
                TableSchema::new(
                    "Report",
                    vec![col("SettingsId", SemanticType::ForeignKey, 0), col("version", SemanticType::String, 1)],
                ),
                TableSchema::new(
                    "Case",
                    vec![col("sampId", SemanticType::String, 0), col("ReportId", SemanticType::ForeignKey, 1)],
                ),
                TableSchema::new("Result", vec![col("CaseId", SemanticType::ForeignKey, 0)]),
            ],
            vec![Relation::new("Report", "Case"), Relation::new("Case", "Result")],
        )
        .unwrap()
    }

    #[test]
    fn test_diff_is_additive() {
        let statements = diff_schemas(&old_schema(), &new_schema());
        let described: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            described,
            vec![
                "drop foreign key Report.SettingsId -> Settings",
                "add column Report.version",
                "add column Case.ReportId",
                "add foreign key Case.ReportId -> Report",
                "create table Result",
            ]
        );

        // The dropped constraint keeps the column
        let MigrationStatement::DropForeignKey { shape, .. } = &statements[0] else {
            panic!("expected a constraint drop");
        };
        let column = shape.column("SettingsId").unwrap();
        assert!(column.references.is_none());
    }

    #[test]
    fn test_diff_is_idempotent() {
        let mut physical = PhysicalSchema::from_schema(&old_schema());
        let statements = diff(&physical, &new_schema());
        physical.apply_all(&statements);
        assert!(diff(&physical, &new_schema()).is_empty());
    }

    #[test]
    fn test_identical_schemas_produce_nothing() {
        assert!(diff_schemas(&new_schema(), &new_schema()).is_empty());
    }

    #[test]
    fn test_columns_missing_from_new_schema_are_kept() {
        let statements = diff_schemas(&new_schema(), &old_schema());
        assert!(statements.iter().all(|s| !matches!(s, MigrationStatement::AddColumn { .. })));
        let mut physical = PhysicalSchema::from_schema(&new_schema());
        physical.apply_all(&statements);
        assert!(physical.get("Case").unwrap().column("ReportId").is_some());
        assert!(physical.get("Result").is_some());
    }
}
