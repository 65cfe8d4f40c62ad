//! Relation Cache - memoized parent rows
//!
//! Two kinds of entries are kept per table name:
//! - the single row of a global-parent table (settings, preferences)
//! - the last parent row looked up for a table, keyed by its identity
//!
//! A cache belongs to one [`Session`](crate::Session); nothing is shared
//! between sessions.

use std::collections::HashMap;
use crate::record::Record;
use crate::schema::ColumnKey;
use crate::storage::RecordStore;
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct RelationCache {
    globals: HashMap<String, Record>,
    parents: HashMap<String, Record>,
}

impl RelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first row of a table expected to hold exactly one row; `None` until it exists
    pub fn global_parent(&mut self, store: &RecordStore<'_>) -> Result<Option<Record>> {
        if let Some(record) = self.globals.get(store.table()) {
            tracing::debug!("Global parent {} served from cache", store.table());
            return Ok(Some(record.clone()));
        }

        let first = store.get_all()?.into_iter().next();
        if let Some(record) = &first {
            self.globals.insert(store.table().to_string(), record.clone());
        }
        Ok(first)
    }

    /// Parent row with identity `parent_id`. Asking again for the same identity
    /// as the previous lookup on this table does not touch storage; any other
    /// identity reads the row and replaces the entry.
    pub fn parent_value(&mut self, store: &RecordStore<'_>, parent_id: i64) -> Result<Option<Record>> {
        if let Some(record) = self.parents.get(store.table()) {
            if record.id() == Some(parent_id) {
                tracing::debug!("Parent {}#{} served from cache", store.table(), parent_id);
                return Ok(Some(record.clone()));
            }
        }

        tracing::debug!("Parent {}#{} read from storage", store.table(), parent_id);
        let record = store.get_by_id(parent_id)?;
        match &record {
            Some(found) => {
                self.parents.insert(store.table().to_string(), found.clone());
            }
            None => {
                self.parents.remove(store.table());
            }
        }
        Ok(record)
    }

    /// Replace cached copies of `record` after it was changed elsewhere.
    /// Returns whether an entry was replaced.
    pub fn update_cache(&mut self, record: &Record) -> bool {
        let mut replaced = false;
        for entries in [&mut self.globals, &mut self.parents] {
            if let Some(cached) = entries.get_mut(record.table()) {
                if cached.id().is_some() && cached.id() == record.id() {
                    *cached = record.clone();
                    replaced = true;
                }
            }
        }
        replaced
    }

    /// Identity of the last parent looked up for `table`
    pub fn last_parent_id(&self, table: &str) -> Option<i64> {
        self.parents.get(table).and_then(|r| r.id())
    }

    /// Forget every entry of `table`
    pub fn invalidate(&mut self, table: &str) {
        self.globals.remove(table);
        self.parents.remove(table);
    }

    pub fn clear(&mut self) {
        self.globals.clear();
        self.parents.clear();
    }
}

/// Point `child` at `parent`: copy the parent's identity into the child's
/// `<parent>Id` column, using the relation the child declares toward the parent.
pub fn inject_parent(parent: &Record, child: &mut Record) -> Result<()> {
    let relation = child
        .schema()
        .relation_to_parent(parent.table())
        .ok_or_else(|| Error::UnknownRelation {
            parent: parent.table().to_string(),
            child: child.table().to_string(),
        })?
        .clone();
    let value = parent
        .get_key(ColumnKey::Identity)
        .cloned()
        .ok_or_else(|| Error::UnsavedRecord(parent.table().to_string()))?;
    child.put(&relation.foreign_key_column(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NoCatalog;
    use crate::record::CellValue;
    use crate::schema::{ColumnDefinition, Relation, Schema, SemanticType, TableSchema};
    use crate::storage::{Database, Source, StoreConfig};

    fn schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new("Settings", vec![ColumnDefinition::new("country", SemanticType::String)]),
                TableSchema::new("Report", vec![ColumnDefinition::new("version", SemanticType::String)]),
                TableSchema::new("Summary", vec![ColumnDefinition::new("ReportId", SemanticType::ForeignKey)]),
            ],
            vec![Relation::new("Report", "Summary")],
        )
        .unwrap()
    }

    fn setup() -> (tempfile::TempDir, Database, Schema) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("data.db"), StoreConfig::default()).unwrap();
        let schema = schema();
        db.migrate(&schema).unwrap();
        (dir, db, schema)
    }

    #[test]
    fn test_global_parent() {
        let (_dir, db, schema) = setup();
        let store = RecordStore::new(schema.table("Settings").unwrap().clone(), Source::Database(&db), &NoCatalog);
        let mut cache = RelationCache::new();
        assert!(cache.global_parent(&store).unwrap().is_none());

        let mut settings = Record::new(store.schema().clone());
        settings.put_text("country", "IT").unwrap();
        store.add(&mut settings).unwrap();

        let found = cache.global_parent(&store).unwrap().unwrap();
        assert_eq!(found.code("country").unwrap(), "IT");
    }

    #[test]
    fn test_same_parent_id_skips_storage() {
        let (_dir, db, schema) = setup();
        let store = RecordStore::new(schema.table("Report").unwrap().clone(), Source::Database(&db), &NoCatalog);
        let mut first = Record::new(store.schema().clone());
        first.put_text("version", "00").unwrap();
        store.add(&mut first).unwrap();
        let mut second = Record::new(store.schema().clone());
        second.put_text("version", "01").unwrap();
        store.add(&mut second).unwrap();

        let mut cache = RelationCache::new();
        assert!(cache.parent_value(&store, 1).unwrap().is_some());

        // Deleted behind the cache's back: the same id is still served
        store.delete(1).unwrap();
        assert!(cache.parent_value(&store, 1).unwrap().is_some());

        // A different id replaces the entry
        let other = cache.parent_value(&store, 2).unwrap().unwrap();
        assert_eq!(other.code("version").unwrap(), "01");
        assert_eq!(cache.last_parent_id("Report"), Some(2));
        assert!(cache.parent_value(&store, 1).unwrap().is_none());
        assert_eq!(cache.last_parent_id("Report"), None);
    }

    #[test]
    fn test_update_cache_only_replaces_same_identity() {
        let (_dir, db, schema) = setup();
        let store = RecordStore::new(schema.table("Report").unwrap().clone(), Source::Database(&db), &NoCatalog);
        let mut report = Record::new(store.schema().clone());
        report.put_text("version", "00").unwrap();
        store.add(&mut report).unwrap();

        let mut cache = RelationCache::new();
        cache.parent_value(&store, 1).unwrap();

        let mut changed = report.clone();
        changed.put_text("version", "05").unwrap();
        assert!(cache.update_cache(&changed));
        assert_eq!(cache.parent_value(&store, 1).unwrap().unwrap().code("version").unwrap(), "05");

        let mut stranger = Record::new(store.schema().clone());
        stranger.set_id(99);
        assert!(!cache.update_cache(&stranger));
    }

    #[test]
    fn test_inject_parent() {
        let schema = schema();
        let mut report = Record::new(schema.table("Report").unwrap().clone());
        let mut summary = Record::new(schema.table("Summary").unwrap().clone());
        assert!(matches!(inject_parent(&report, &mut summary), Err(Error::UnsavedRecord(_))));

        report.set_id(4);
        inject_parent(&report, &mut summary).unwrap();
        assert_eq!(summary.get("ReportId").unwrap(), Some(&CellValue::foreign_key(4)));

        let settings = Record::new(schema.table("Settings").unwrap().clone());
        assert!(matches!(inject_parent(&settings, &mut summary), Err(Error::UnknownRelation { .. })));
    }
}
