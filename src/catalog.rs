//! Catalog lookup - resolves picklist codes to labels
//!
//! Catalogs are owned by an external collaborator; the engine only asks for
//! the label of a `(picklist key, code)` pair.

use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Source of picklist labels
pub trait Catalog: Send + Sync {
    /// Label for `code` in picklist `picklist_key`, `None` when unknown
    fn resolve_label(&self, picklist_key: &str, code: &str) -> Option<String>;
}

/// A catalog that knows no codes; labels fall back to codes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl Catalog for NoCatalog {
    fn resolve_label(&self, _picklist_key: &str, _code: &str) -> Option<String> {
        None
    }
}

/// Catalog held in memory, loadable from TOML:
///
/// ```toml
/// [COUNTRY]
/// IT = "Italy"
/// FR = "France"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryCatalog {
    picklists: HashMap<String, HashMap<String, String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, picklist_key: impl Into<String>, code: impl Into<String>, label: impl Into<String>) {
        self.picklists
            .entry(picklist_key.into())
            .or_default()
            .insert(code.into(), label.into());
    }

    pub fn with(mut self, picklist_key: &str, code: &str, label: &str) -> Self {
        self.insert(picklist_key, code, label);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn len(&self) -> usize {
        self.picklists.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Catalog for InMemoryCatalog {
    fn resolve_label(&self, picklist_key: &str, code: &str) -> Option<String> {
        self.picklists.get(picklist_key)?.get(code).cloned()
    }
}
