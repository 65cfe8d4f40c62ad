//! Schema Model - tables, columns and the relation graph between them
//!
//! A [`Schema`] is built once from a definition [`Workbook`] and shared
//! read-only afterwards. Relations form a DAG over table names.

pub mod column;
pub mod definition;
pub mod table;

pub use column::{ColumnDefinition, SemanticType};
pub use definition::{Sheet, Workbook, RELATIONS_SHEET};
pub use table::{identity_column_name, ColumnKey, Relation, TableSchema};

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use crate::{Error, Result};

/// All tables of one application and the relations between them
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Tables in declaration order
    tables: Vec<Arc<TableSchema>>,
    index: HashMap<String, usize>,
    relations: Vec<Relation>,
}

impl Schema {
    /// Assemble a schema. Relations naming an undeclared table are skipped;
    /// a cycle in the relation graph is a definition error.
    pub fn new(tables: Vec<TableSchema>, relations: Vec<Relation>) -> Result<Self> {
        let mut owned: Vec<TableSchema> = Vec::with_capacity(tables.len());
        let mut index = HashMap::new();
        for table in tables {
            if index.contains_key(table.name()) {
                tracing::warn!("Table {} declared twice, keeping the first declaration", table.name());
                continue;
            }
            index.insert(table.name().to_string(), owned.len());
            owned.push(table);
        }

        let mut kept = Vec::new();
        for relation in relations {
            let (Some(&p), Some(&c)) = (index.get(&relation.parent), index.get(&relation.child)) else {
                tracing::warn!("Relation {} names an undeclared table, skipped", relation);
                continue;
            };
            if kept.contains(&relation) {
                continue;
            }
            owned[p].add_child_relation(relation.clone());
            owned[c].add_parent_relation(relation.clone());
            kept.push(relation);
        }

        check_acyclic(&owned, &index, &kept)?;

        Ok(Self {
            tables: owned.into_iter().map(Arc::new).collect(),
            index,
            relations: kept,
        })
    }

    /// Build a schema from a definition workbook
    pub fn from_workbook(workbook: &Workbook) -> Result<Self> {
        let tables = workbook
            .table_sheets()
            .map(|sheet| TableSchema::new(sheet.name.trim(), definition::read_columns(sheet)))
            .collect();
        let relations = workbook
            .relations_sheet()
            .map(definition::read_relations)
            .unwrap_or_default();
        Self::new(tables, relations)
    }

    /// Load a schema from a TOML or JSON workbook file
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_workbook(&Workbook::load(path)?)
    }

    pub fn tables(&self) -> &[Arc<TableSchema>] {
        &self.tables
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.index.get(name).map(|i| &self.tables[*i])
    }

    /// Look up a table, failing with [`Error::UnknownTable`]
    pub fn table(&self, name: &str) -> Result<&Arc<TableSchema>> {
        self.get(name).ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a declared relation, failing with [`Error::UnknownRelation`]
    pub fn relation(&self, parent: &str, child: &str) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.parent == parent && r.child == child)
            .ok_or_else(|| Error::UnknownRelation {
                parent: parent.to_string(),
                child: child.to_string(),
            })
    }

    /// Tables without a parent relation
    pub fn roots(&self) -> Vec<&Arc<TableSchema>> {
        self.tables.iter().filter(|t| t.is_root()).collect()
    }
}

/// Kahn's algorithm over the relation graph
fn check_acyclic(tables: &[TableSchema], index: &HashMap<String, usize>, relations: &[Relation]) -> Result<()> {
    let mut in_degree = vec![0usize; tables.len()];
    for relation in relations {
        in_degree[index[&relation.child]] += 1;
    }

    let mut queue: VecDeque<usize> = (0..tables.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut visited = 0;
    while let Some(i) = queue.pop_front() {
        visited += 1;
        for relation in tables[i].child_relations() {
            let child = index[&relation.child];
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if visited != tables.len() {
        let cyclic: Vec<&str> = (0..tables.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| tables[i].name())
            .collect();
        return Err(Error::Definition(format!("Relation cycle between tables: {}", cyclic.join(", "))));
    }
    Ok(())
}
