//! Tree import - nested record documents into the record store
//!
//! A document is one node or (in JSON) a list of nodes:
//!
//! ```toml
//! table = "Report"
//! values = { version = "00", country = "IT" }
//!
//! [[children]]
//! table = "Summary"
//! values = { matrix = "milk" }
//! ```
//!
//! Nodes are stored top-down in document order. Each child gets the new
//! identity of its parent before it is inserted.

use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::formula::FormulaSolver;
use crate::record::{CellValue, Record};
use crate::relation_cache::inject_parent;
use crate::session::Session;
use crate::storage::UnitOfWork;
use crate::{Error, Result};

/// A cell in an import document; numbers and flags are stored as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl std::fmt::Display for InputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputValue::Text(s) => write!(f, "{}", s),
            InputValue::Integer(n) => write!(f, "{}", n),
            InputValue::Float(n) => write!(f, "{}", n),
            InputValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub table: String,
    #[serde(default)]
    pub values: BTreeMap<String, InputValue>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<TreeNode>),
    One(TreeNode),
}

/// Read an import document, JSON by extension, TOML otherwise
pub fn load_document(path: &Path) -> Result<Vec<TreeNode>> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let document: Document = if is_json {
        serde_json::from_str(&contents).map_err(|e| Error::Import(format!("{}: {}", path.display(), e)))?
    } else {
        toml::from_str(&contents).map_err(|e| Error::Import(format!("{}: {}", path.display(), e)))?
    };

    Ok(match document {
        Document::Many(nodes) => nodes,
        Document::One(node) => vec![node],
    })
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Stored top-level records, in document order
    pub roots: Vec<Record>,
    /// Inserted rows per table
    pub created: BTreeMap<String, usize>,
}

impl ImportReport {
    pub fn rows(&self, table: &str) -> usize {
        self.created.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.created.values().sum()
    }
}

/// Store every node of `nodes` as one unit of work
pub fn import_tree(session: &Session, nodes: &[TreeNode], formulas: &dyn FormulaSolver) -> Result<ImportReport> {
    let report = session.unit_of_work(|unit| store_nodes(session, unit, nodes, formulas))?;
    tracing::info!("Imported {} records into {} tables", report.total(), report.created.len());
    Ok(report)
}

fn store_nodes(
    session: &Session,
    unit: &UnitOfWork,
    nodes: &[TreeNode],
    formulas: &dyn FormulaSolver,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut stack: Vec<(&TreeNode, Option<Record>)> = nodes.iter().rev().map(|n| (n, None)).collect();

    while let Some((node, parent)) = stack.pop() {
        let mut record = session.new_record(&node.table)?;
        for (column, value) in &node.values {
            record.put(column, CellValue::text(value.to_string()))?;
        }
        formulas.compute_and_apply(&mut record);

        if let Some(parent) = &parent {
            session.schema().relation(parent.table(), &node.table)?;
            inject_parent(parent, &mut record)?;
        }

        if session.store_in(unit, &node.table)?.add(&mut record)?.is_none() {
            return Err(Error::Import(format!("could not store a {} record", node.table)));
        }
        *report.created.entry(node.table.clone()).or_default() += 1;

        for child in node.children.iter().rev() {
            stack.push((child, Some(record.clone())));
        }
        if parent.is_none() {
            report.roots.push(record);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, Relation, Schema, SemanticType, TableSchema};
    use crate::storage::StoreConfig;

    fn schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new(
                    "Report",
                    vec![
                        ColumnDefinition::new("version", SemanticType::String),
                        ColumnDefinition::new("units", SemanticType::String).with_order(1),
                    ],
                ),
                TableSchema::new(
                    "Sample",
                    vec![
                        ColumnDefinition::new("ReportId", SemanticType::ForeignKey),
                        ColumnDefinition::new("code", SemanticType::String).with_order(1),
                    ],
                ),
            ],
            vec![Relation::new("Report", "Sample")],
        )
        .unwrap()
    }

    fn session(dir: &tempfile::TempDir) -> Session {
        let session = Session::open(dir.path().join("data.db"), schema(), StoreConfig::default()).unwrap();
        session.initialize().unwrap();
        session
    }

    const DOCUMENT: &str = r#"
        table = "Report"
        values = { version = "00", units = 2 }

        [[children]]
        table = "Sample"
        values = { code = "first" }

        [[children]]
        table = "Sample"
        values = { code = "second" }
    "#;

    #[test]
    fn test_import_injects_parents_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let node: TreeNode = toml::from_str(DOCUMENT).unwrap();
        assert_eq!(node.size(), 3);

        let report = import_tree(&session, &[node], &crate::formula::NoFormulas).unwrap();
        assert_eq!(report.rows("Report"), 1);
        assert_eq!(report.rows("Sample"), 2);
        assert_eq!(report.roots[0].code("units").unwrap(), "2");

        let samples = session
            .store("Sample")
            .unwrap()
            .get_by_parent_id("Report", report.roots[0].id().unwrap())
            .unwrap();
        let codes: Vec<&str> = samples.iter().map(|s| s.code("code").unwrap()).collect();
        assert_eq!(codes, vec!["first", "second"]);
    }

    #[test]
    fn test_formulas_run_before_insert() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let node: TreeNode = toml::from_str(DOCUMENT).unwrap();

        let solver = |record: &mut Record| {
            if record.table() == "Report" {
                record.put_text("version", "07").unwrap();
            }
        };
        let report = import_tree(&session, &[node], &solver).unwrap();
        let stored = session.store("Report").unwrap().get_by_id(report.roots[0].id().unwrap()).unwrap().unwrap();
        assert_eq!(stored.code("version").unwrap(), "07");
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);

        let bad_column: TreeNode = serde_json::from_str(r#"{"table": "Report", "values": {"nope": "x"}}"#).unwrap();
        assert!(matches!(
            import_tree(&session, &[bad_column], &crate::formula::NoFormulas),
            Err(Error::UnknownColumn { .. })
        ));

        let bad_nesting: TreeNode =
            serde_json::from_str(r#"{"table": "Report", "children": [{"table": "Report"}]}"#).unwrap();
        assert!(matches!(
            import_tree(&session, &[bad_nesting], &crate::formula::NoFormulas),
            Err(Error::UnknownRelation { .. })
        ));
    }

    #[test]
    fn test_load_json_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        std::fs::write(&path, r#"[{"table": "Report"}, {"table": "Report", "values": {"version": "01"}}]"#).unwrap();
        let nodes = load_document(&path).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].values["version"], InputValue::Text("01".to_string()));
    }
}
