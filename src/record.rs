//! Records - one row of a runtime-declared table

use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::schema::{ColumnKey, TableSchema};
use crate::{Error, Result};

/// A cell as seen by the application: a stored code and a display label.
///
/// - Foreign keys: `code` is the referenced row identity, the label mirrors it
/// - Picklists: `code` is a catalog code, `label` its resolved description
/// - Strings: `code == label`, the raw stored text
///
/// An empty string is a value; a missing cell is `None` on the record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellValue {
    pub code: String,
    pub label: String,
}

impl CellValue {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }

    /// A value whose code and label are the same text
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            code: value,
        }
    }

    /// A reference to the row with the given identity
    pub fn foreign_key(id: i64) -> Self {
        Self::text(id.to_string())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.label.is_empty()
    }

    /// Text written to storage: the code when present, else the label
    pub fn stored_text(&self) -> &str {
        if self.code.is_empty() { &self.label } else { &self.code }
    }
}

/// One row's in-memory representation, bound to exactly one table schema.
///
/// The identity is unset until the record is first stored.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<TableSchema>,
    id: Option<i64>,
    values: BTreeMap<ColumnKey, CellValue>,
}

impl Record {
    /// Create an empty, unsaved record
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            id: None,
            values: BTreeMap::new(),
        }
    }

    /// Create a record with every column carrying its declared default
    pub fn with_defaults(schema: Arc<TableSchema>) -> Self {
        let mut record = Self::new(schema.clone());
        for (i, column) in schema.columns().iter().enumerate() {
            if column.default_code.is_none() && column.default_value.is_none() {
                continue;
            }
            let code = column.default_code.clone().unwrap_or_default();
            let label = column.default_value.clone().unwrap_or_else(|| code.clone());
            record.values.insert(ColumnKey::Declared(i), CellValue::new(code, label));
        }
        record
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.name()
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Identity of a stored record, failing for an unsaved one
    pub fn saved_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| Error::UnsavedRecord(self.table().to_string()))
    }

    /// Set the identity; the identity column mirrors it as text
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
        self.values.insert(ColumnKey::Identity, CellValue::foreign_key(id));
    }

    fn resolve(&self, column: &str) -> Result<ColumnKey> {
        self.schema.key(column).ok_or_else(|| Error::UnknownColumn {
            table: self.table().to_string(),
            column: column.to_string(),
        })
    }

    /// Value of a column. Unknown columns are an error, a declared column
    /// without a value is `Ok(None)`.
    pub fn get(&self, column: &str) -> Result<Option<&CellValue>> {
        let key = self.resolve(column)?;
        Ok(self.values.get(&key))
    }

    /// Code of a column, empty when the column has no value
    pub fn code(&self, column: &str) -> Result<&str> {
        Ok(self.get(column)?.map(|v| v.code.as_str()).unwrap_or(""))
    }

    pub fn get_key(&self, key: ColumnKey) -> Option<&CellValue> {
        self.values.get(&key)
    }

    /// Set a column value. Putting the identity column sets the identity.
    pub fn put(&mut self, column: &str, value: CellValue) -> Result<()> {
        match self.resolve(column)? {
            ColumnKey::Identity => {
                let id = value.code.trim().parse::<i64>().map_err(|_| Error::InvalidValue {
                    column: column.to_string(),
                    value: value.code.clone(),
                })?;
                self.set_id(id);
            }
            key => {
                self.values.insert(key, value);
            }
        }
        Ok(())
    }

    /// Shorthand for putting a text value
    pub fn put_text(&mut self, column: &str, value: impl Into<String>) -> Result<()> {
        self.put(column, CellValue::text(value))
    }

    pub fn put_key(&mut self, key: ColumnKey, value: CellValue) {
        match key {
            ColumnKey::Identity => {
                if let Ok(id) = value.code.trim().parse::<i64>() {
                    self.set_id(id);
                }
            }
            key => {
                self.values.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Result<Option<CellValue>> {
        let key = self.resolve(column)?;
        Ok(self.values.remove(&key))
    }

    /// Declared column values, without the identity column
    pub fn declared_values(&self) -> impl Iterator<Item = (ColumnKey, &CellValue)> {
        self.values
            .iter()
            .filter(|(k, _)| **k != ColumnKey::Identity)
            .map(|(k, v)| (*k, v))
    }

    /// A new, unsaved record of the same table carrying the same declared values
    pub fn duplicate(&self) -> Record {
        let mut copy = Record::new(self.schema.clone());
        for (key, value) in self.declared_values() {
            copy.values.insert(key, value.clone());
        }
        copy
    }
}
