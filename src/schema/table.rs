//! Table schemas and relations

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use super::column::ColumnDefinition;

/// Name of the identity column of a table: `<table>Id`.
pub fn identity_column_name(table: &str) -> String {
    format!("{}Id", table)
}

/// A declared one-to-many edge between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub parent: String,
    pub child: String,
}

impl Relation {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Column of the child table holding the parent's identity
    pub fn foreign_key_column(&self) -> String {
        identity_column_name(&self.parent)
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

/// Closed key of a column within one table, assigned when the schema is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKey {
    /// The `<table>Id` identity column
    Identity,
    /// Index into the table's declared columns
    Declared(usize),
}

/// The declared shape of one table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    identity_column: String,
    /// Declared columns, sorted by declared order
    columns: Vec<ColumnDefinition>,
    /// Column positions in the order the definition file lists them
    file_order: Vec<usize>,
    /// Column positions sorted by column id, used for parameter binding
    binding_order: Vec<usize>,
    by_id: HashMap<String, usize>,
    /// Relations where this table is the child
    parent_relations: Vec<Relation>,
    /// Relations where this table is the parent
    child_relations: Vec<Relation>,
}

impl TableSchema {
    /// Build a table schema. Columns are kept in declared order; a duplicate
    /// column id keeps its first declaration.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        let name = name.into();
        let identity_column = identity_column_name(&name);
        let mut unique: Vec<ColumnDefinition> = Vec::with_capacity(columns.len());
        for column in columns {
            if column.id == identity_column {
                tracing::warn!("Column {} of table {} shadows the identity column, ignored", column.id, name);
                continue;
            }
            if unique.iter().any(|c| c.id == column.id) {
                tracing::warn!("Duplicate column {} in table {} ignored", column.id, name);
                continue;
            }
            unique.push(column);
        }
        // Stable: equal orders keep file order
        let mut positioned: Vec<(usize, ColumnDefinition)> = unique.into_iter().enumerate().collect();
        positioned.sort_by_key(|(_, c)| c.order);
        let mut file_order = vec![0; positioned.len()];
        for (index, (position, _)) in positioned.iter().enumerate() {
            file_order[*position] = index;
        }
        let unique: Vec<ColumnDefinition> = positioned.into_iter().map(|(_, c)| c).collect();

        let by_id = unique
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut binding_order: Vec<usize> = (0..unique.len()).collect();
        binding_order.sort_by(|a, b| unique[*a].id.cmp(&unique[*b].id));

        Self {
            identity_column,
            name,
            columns: unique,
            file_order,
            binding_order,
            by_id,
            parent_relations: Vec::new(),
            child_relations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity_column(&self) -> &str {
        &self.identity_column
    }

    /// Columns in declared order
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Columns in the order the definition file lists them, used for DDL
    pub fn file_ordered_columns(&self) -> impl Iterator<Item = &ColumnDefinition> + '_ {
        self.file_order.iter().map(|i| &self.columns[*i])
    }

    /// Keys of the declared columns in declared order
    pub fn declared_keys(&self) -> impl Iterator<Item = ColumnKey> + '_ {
        (0..self.columns.len()).map(ColumnKey::Declared)
    }

    /// Keys of the declared columns in lexicographic id order
    pub fn binding_keys(&self) -> impl Iterator<Item = ColumnKey> + '_ {
        self.binding_order.iter().map(|i| ColumnKey::Declared(*i))
    }

    /// Resolve a column name, including the identity column
    pub fn key(&self, column: &str) -> Option<ColumnKey> {
        if column == self.identity_column {
            return Some(ColumnKey::Identity);
        }
        self.by_id.get(column).map(|i| ColumnKey::Declared(*i))
    }

    /// Definition behind a key; `None` for the identity column
    pub fn definition(&self, key: ColumnKey) -> Option<&ColumnDefinition> {
        match key {
            ColumnKey::Identity => None,
            ColumnKey::Declared(i) => self.columns.get(i),
        }
    }

    pub fn column(&self, id: &str) -> Option<&ColumnDefinition> {
        self.by_id.get(id).map(|i| &self.columns[*i])
    }

    pub fn column_name(&self, key: ColumnKey) -> &str {
        match key {
            ColumnKey::Identity => &self.identity_column,
            ColumnKey::Declared(i) => &self.columns[i].id,
        }
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.column(column).is_some_and(|c| c.is_foreign_key())
    }

    /// Parent table a foreign-key column points to. Only columns typed
    /// FOREIGN_KEY and backed by a declared relation have one.
    pub fn foreign_key_target(&self, column: &str) -> Option<&str> {
        if self.is_foreign_key(column) {
            self.referenced_table(column)
        } else {
            None
        }
    }

    pub fn is_picklist(&self, column: &str) -> bool {
        self.column(column).is_some_and(|c| c.is_picklist())
    }

    pub fn parent_relations(&self) -> &[Relation] {
        &self.parent_relations
    }

    pub fn child_relations(&self) -> &[Relation] {
        &self.child_relations
    }

    /// Relation this table declares toward `parent`
    pub fn relation_to_parent(&self, parent: &str) -> Option<&Relation> {
        self.parent_relations.iter().find(|r| r.parent == parent)
    }

    /// Parent table referenced by a column, if a declared relation backs it
    pub fn referenced_table(&self, column: &str) -> Option<&str> {
        self.parent_relations
            .iter()
            .find(|r| r.foreign_key_column() == column)
            .map(|r| r.parent.as_str())
    }

    pub fn is_leaf(&self) -> bool {
        self.child_relations.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent_relations.is_empty()
    }

    pub(super) fn add_parent_relation(&mut self, relation: Relation) {
        if !self.parent_relations.contains(&relation) {
            self.parent_relations.push(relation);
        }
    }

    pub(super) fn add_child_relation(&mut self, relation: Relation) {
        if !self.child_relations.contains(&relation) {
            self.child_relations.push(relation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SemanticType;

    fn sample_table() -> TableSchema {
        TableSchema::new(
            "Case",
            vec![
                ColumnDefinition::new("sampId", SemanticType::String).with_order(0),
                ColumnDefinition::new("SummaryId", SemanticType::ForeignKey).with_order(1),
                ColumnDefinition::new("animalId", SemanticType::String).with_order(2),
            ],
        )
    }

    #[test]
    fn test_declared_and_binding_order_differ() {
        let table = sample_table();
        let declared: Vec<_> = table.declared_keys().map(|k| table.column_name(k).to_string()).collect();
        assert_eq!(declared, vec!["sampId", "SummaryId", "animalId"]);

        let bound: Vec<_> = table.binding_keys().map(|k| table.column_name(k).to_string()).collect();
        // Byte order: uppercase sorts before lowercase
        assert_eq!(bound, vec!["SummaryId", "animalId", "sampId"]);
    }

    #[test]
    fn test_file_order_survives_declared_sort() {
        let table = TableSchema::new(
            "T",
            vec![
                ColumnDefinition::new("zeta", SemanticType::String).with_order(2),
                ColumnDefinition::new("alpha", SemanticType::String).with_order(1),
            ],
        );
        let declared: Vec<_> = table.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(declared, vec!["alpha", "zeta"]);
        let listed: Vec<_> = table.file_ordered_columns().map(|c| c.id.as_str()).collect();
        assert_eq!(listed, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_identity_column_key() {
        let table = sample_table();
        assert_eq!(table.identity_column(), "CaseId");
        assert_eq!(table.key("CaseId"), Some(ColumnKey::Identity));
        assert!(table.key("missing").is_none());
        assert!(table.is_foreign_key("SummaryId"));
        assert!(!table.is_foreign_key("sampId"));
    }

    #[test]
    fn test_duplicate_columns_keep_first() {
        let table = TableSchema::new(
            "Result",
            vec![
                ColumnDefinition::new("paramCode", SemanticType::String).with_order(1),
                ColumnDefinition::new("paramCode", SemanticType::Picklist).with_order(2),
            ],
        );
        assert_eq!(table.columns().len(), 1);
        assert_eq!(table.columns()[0].semantic_type, SemanticType::String);
    }

    #[test]
    fn test_relation_foreign_key_column() {
        let relation = Relation::new("Report", "Summary");
        assert_eq!(relation.foreign_key_column(), "ReportId");
    }
}
