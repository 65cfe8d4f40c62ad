//! Session - one database, one schema, one relation cache

use std::sync::Arc;
use crate::catalog::{Catalog, NoCatalog};
use crate::compiler::MigrationReport;
use crate::record::Record;
use crate::relation_cache::{self, RelationCache};
use crate::schema::{Relation, Schema};
use crate::storage::{Database, RecordStore, Source, StoreConfig, UnitOfWork};
use crate::Result;

/// Context every record operation runs in.
///
/// The relation cache lives here and dies with the session, so two sessions
/// over the same database never observe each other's cached rows.
pub struct Session {
    db: Database,
    schema: Arc<Schema>,
    catalog: Arc<dyn Catalog>,
    cache: RelationCache,
}

impl Session {
    pub fn new(db: Database, schema: Arc<Schema>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            db,
            schema,
            catalog,
            cache: RelationCache::new(),
        }
    }

    /// Open `path` without a catalog
    pub fn open(path: impl AsRef<std::path::Path>, schema: Schema, config: StoreConfig) -> Result<Self> {
        let db = Database::open(path, config)?;
        Ok(Self::new(db, Arc::new(schema), Arc::new(NoCatalog)))
    }

    /// Bring the database structure up to the session schema
    pub fn initialize(&self) -> Result<MigrationReport> {
        self.db.migrate(&self.schema)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        self.db.config()
    }

    /// Record store of `table`, one connection per call
    pub fn store(&self, table: &str) -> Result<RecordStore<'_>> {
        let schema = self.schema.table(table)?.clone();
        Ok(RecordStore::new(schema, Source::Database(&self.db), self.catalog.as_ref()))
    }

    /// Record store of `table` bound to the connection of `unit`
    pub fn store_in<'u>(&'u self, unit: &'u UnitOfWork, table: &str) -> Result<RecordStore<'u>> {
        let schema = self.schema.table(table)?.clone();
        Ok(RecordStore::new(schema, unit.source(), self.catalog.as_ref()))
    }

    /// Empty record of `table` carrying its declared defaults
    pub fn new_record(&self, table: &str) -> Result<Record> {
        Ok(Record::with_defaults(self.schema.table(table)?.clone()))
    }

    pub fn unit_of_work<T>(&self, work: impl FnOnce(&UnitOfWork) -> Result<T>) -> Result<T> {
        self.db.unit_of_work(work)
    }

    pub fn global_parent(&mut self, table: &str) -> Result<Option<Record>> {
        let schema = self.schema.table(table)?.clone();
        let store = RecordStore::new(schema, Source::Database(&self.db), self.catalog.as_ref());
        self.cache.global_parent(&store)
    }

    /// Parent row of `relation` with identity `parent_id`, memoized per parent table
    pub fn parent_of(&mut self, relation: &Relation, parent_id: i64) -> Result<Option<Record>> {
        self.schema.relation(&relation.parent, &relation.child)?;
        let schema = self.schema.table(&relation.parent)?.clone();
        let store = RecordStore::new(schema, Source::Database(&self.db), self.catalog.as_ref());
        self.cache.parent_value(&store, parent_id)
    }

    /// Parent of `child` in `parent_table`, following the child's foreign key
    pub fn parent_of_record(&mut self, child: &Record, parent_table: &str) -> Result<Option<Record>> {
        let relation = self.schema.relation(parent_table, child.table())?.clone();
        let code = child.code(&relation.foreign_key_column())?;
        match code.parse::<i64>() {
            Ok(parent_id) => self.parent_of(&relation, parent_id),
            Err(_) => {
                tracing::warn!(
                    "{}.{} does not hold a parent identity: {:?}",
                    child.table(),
                    relation.foreign_key_column(),
                    code
                );
                Ok(None)
            }
        }
    }

    /// Tell the cache that `record` was changed outside the relation layer
    pub fn refresh_cached(&mut self, record: &Record) -> bool {
        self.cache.update_cache(record)
    }

    pub fn invalidate(&mut self, table: &str) {
        self.cache.invalidate(table);
    }

    pub fn inject_parent(&self, parent: &Record, child: &mut Record) -> Result<()> {
        relation_cache::inject_parent(parent, child)
    }
}
