//! Column definitions
//!
//! Every column declared for a table has one of three semantic types:
//! - `String`: free text, stored and shown verbatim
//! - `ForeignKey`: numeric identity of a row in a parent table
//! - `Picklist`: external catalog code whose label is resolved on read

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Semantic type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SemanticType {
    #[default]
    String,
    ForeignKey,
    Picklist,
}

impl SemanticType {
    /// Get the string representation used in definition workbooks
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "STRING",
            SemanticType::ForeignKey => "FOREIGN_KEY",
            SemanticType::Picklist => "PICKLIST",
        }
    }

    pub fn all() -> &'static [SemanticType] {
        &[SemanticType::String, SemanticType::ForeignKey, SemanticType::Picklist]
    }
}

impl FromStr for SemanticType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "STRING" | "TEXT" => Ok(SemanticType::String),
            "FOREIGN_KEY" | "FOREIGNKEY" | "FK" => Ok(SemanticType::ForeignKey),
            "PICKLIST" | "CATALOG" => Ok(SemanticType::Picklist),
            _ => Err(crate::Error::Definition(format!("Unknown column type: {}", s))),
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One column declared for a table.
///
/// Two orderings exist for columns and must not be confused:
/// `order` is the declared order used for display and export, while the
/// storage layer binds parameters in lexicographic `id` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, unique within its table
    pub id: String,
    pub semantic_type: SemanticType,
    pub mandatory: bool,
    pub visible: bool,
    pub editable: bool,
    /// Whether the column is written by the exporter
    pub put_in_output: bool,
    /// Catalog key, present iff the type is `Picklist`
    pub picklist_key: Option<String>,
    pub default_code: Option<String>,
    pub default_value: Option<String>,
    /// Element name used by the exporter
    pub output_tag: String,
    /// Declared position
    pub order: i64,
}

impl ColumnDefinition {
    /// Create a plain visible, editable string column
    pub fn new(id: impl Into<String>, semantic_type: SemanticType) -> Self {
        let id = id.into();
        Self {
            output_tag: id.clone(),
            id,
            semantic_type,
            mandatory: false,
            visible: true,
            editable: true,
            put_in_output: false,
            picklist_key: None,
            default_code: None,
            default_value: None,
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_output(mut self, tag: impl Into<String>) -> Self {
        self.put_in_output = true;
        self.output_tag = tag.into();
        self
    }

    pub fn with_picklist(mut self, key: impl Into<String>) -> Self {
        self.semantic_type = SemanticType::Picklist;
        self.picklist_key = Some(key.into());
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.semantic_type == SemanticType::ForeignKey
    }

    pub fn is_picklist(&self) -> bool {
        self.semantic_type == SemanticType::Picklist
    }
}
