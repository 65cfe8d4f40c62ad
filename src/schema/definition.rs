//! Definition workbook - the tabular source tables and relations are declared in
//!
//! A workbook is a list of sheets, each with a header row and data rows. One
//! sheet per table lists its columns; the `Relations` sheet lists
//! `(parentTable, childTable)` pairs. Workbooks are read from TOML or JSON:
//!
//! ```toml
//! [[sheet]]
//! name = "Report"
//! headers = ["id", "type", "outputTag", "putInOutput"]
//! rows = [
//!     ["country", "PICKLIST", "repCountry", "yes"],
//! ]
//! ```
//!
//! Definition problems are never fatal: unknown or ambiguous headers are
//! ignored, rows without an id are skipped and a malformed type reads as STRING.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use super::column::{ColumnDefinition, SemanticType};
use super::table::Relation;

/// Name of the sheet holding relation declarations
pub const RELATIONS_SHEET: &str = "Relations";

/// A whole definition source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(rename = "sheet", alias = "sheets", default)]
    pub sheets: Vec<Sheet>,
}

/// One sheet: a header row and data rows of raw cell text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn is_relations(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case(RELATIONS_SHEET)
    }
}

impl Workbook {
    /// Load a workbook, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        match ext.as_str() {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| Error::Definition(format!("{}: {}", path.display(), e))),
            _ => Self::from_toml(&contents),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Definition(e.to_string()))
    }

    /// Sheets that declare tables, in file order
    pub fn table_sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter().filter(|s| !s.is_relations())
    }

    pub fn relations_sheet(&self) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.is_relations())
    }
}

/// Column attribute a header maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Type,
    OutputTag,
    Mandatory,
    Visible,
    Editable,
    PutInOutput,
    PicklistKey,
    DefaultCode,
    DefaultValue,
    Order,
    Parent,
    Child,
}

impl Field {
    fn from_header(header: &str) -> Option<Field> {
        let normalized: String = header
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "id" | "code" | "columnid" => Some(Field::Id),
            "type" | "semantictype" => Some(Field::Type),
            "outputtag" | "xmltag" | "tag" => Some(Field::OutputTag),
            "mandatory" => Some(Field::Mandatory),
            "visible" => Some(Field::Visible),
            "editable" => Some(Field::Editable),
            "putinoutput" | "output" => Some(Field::PutInOutput),
            "picklistkey" | "picklist" => Some(Field::PicklistKey),
            "defaultcode" => Some(Field::DefaultCode),
            "defaultvalue" => Some(Field::DefaultValue),
            "order" => Some(Field::Order),
            "parenttable" | "parent" => Some(Field::Parent),
            "childtable" | "child" => Some(Field::Child),
            _ => None,
        }
    }
}

/// Map each header position to a field; headers seen twice map to nothing.
fn header_fields(headers: &[String]) -> Vec<Option<Field>> {
    let mapped: Vec<Option<Field>> = headers.iter().map(|h| Field::from_header(h)).collect();
    mapped
        .iter()
        .map(|field| match field {
            Some(f) if mapped.iter().filter(|m| *m == &Some(*f)).count() == 1 => Some(*f),
            Some(f) => {
                tracing::debug!("Ambiguous header for {:?} ignored", f);
                None
            }
            None => None,
        })
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Read the columns of one table sheet, one definition per row, in file order.
pub fn read_columns(sheet: &Sheet) -> Vec<ColumnDefinition> {
    let fields = header_fields(&sheet.headers);
    let mut columns = Vec::new();

    for (position, row) in sheet.rows.iter().enumerate() {
        let mut id = None;
        let mut column = ColumnDefinition::new("", SemanticType::String).with_order(position as i64);
        let mut output_tag = None;

        for (cell, field) in row.iter().zip(fields.iter()) {
            let Some(field) = field else { continue };
            match field {
                Field::Id => id = non_empty(cell),
                Field::Type => {
                    column.semantic_type = cell.parse().unwrap_or_else(|_| {
                        tracing::debug!("Column type {:?} in {} read as STRING", cell, sheet.name);
                        SemanticType::String
                    });
                }
                Field::OutputTag => output_tag = non_empty(cell),
                Field::Mandatory => column.mandatory = parse_flag(cell).unwrap_or(column.mandatory),
                Field::Visible => column.visible = parse_flag(cell).unwrap_or(column.visible),
                Field::Editable => column.editable = parse_flag(cell).unwrap_or(column.editable),
                Field::PutInOutput => {
                    column.put_in_output = parse_flag(cell).unwrap_or(column.put_in_output)
                }
                Field::PicklistKey => column.picklist_key = non_empty(cell),
                Field::DefaultCode => column.default_code = non_empty(cell),
                Field::DefaultValue => column.default_value = non_empty(cell),
                Field::Order => {
                    if let Ok(order) = cell.trim().parse::<i64>() {
                        column.order = order;
                    }
                }
                Field::Parent | Field::Child => {}
            }
        }

        // Row boundary: finalize the definition
        let Some(id) = id else {
            tracing::debug!("Row {} of sheet {} has no column id, skipped", position + 1, sheet.name);
            continue;
        };
        if column.is_picklist() && column.picklist_key.is_none() {
            tracing::warn!("Picklist column {}.{} has no picklist key, read as STRING", sheet.name, id);
            column.semantic_type = SemanticType::String;
        }
        column.output_tag = output_tag.unwrap_or_else(|| id.clone());
        column.id = id;
        columns.push(column);
    }

    columns
}

/// Read `(parentTable, childTable)` pairs from the relations sheet.
pub fn read_relations(sheet: &Sheet) -> Vec<Relation> {
    let fields = header_fields(&sheet.headers);
    let mut relations = Vec::new();

    for (position, row) in sheet.rows.iter().enumerate() {
        let mut parent = None;
        let mut child = None;
        for (cell, field) in row.iter().zip(fields.iter()) {
            match field {
                Some(Field::Parent) => parent = non_empty(cell),
                Some(Field::Child) => child = non_empty(cell),
                _ => {}
            }
        }
        match (parent, child) {
            (Some(parent), Some(child)) => relations.push(Relation::new(parent, child)),
            _ => tracing::debug!("Relation row {} incomplete, skipped", position + 1),
        }
    }

    relations
}
