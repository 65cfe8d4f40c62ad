//! Version Cloner - amend a report by deep-copying its whole tree
//!
//! Every node gets a brand-new record of the same table, carrying the same
//! values and re-parented to the copy of its parent. Parents are stored
//! before their children are visited so the new identities exist when the
//! children need them.

use std::collections::{BTreeMap, HashMap};
use serde::{Deserialize, Serialize};
use crate::kinds::{self, ReportLayout};
use crate::record::Record;
use crate::relation_cache::inject_parent;
use crate::session::Session;
use crate::storage::UnitOfWork;
use crate::version::Version;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmendOptions {
    #[serde(flatten)]
    pub layout: ReportLayout,
    /// Root columns emptied on the copy (remote id, message ids)
    pub cleared_columns: Vec<String>,
    /// Per table, aggregate columns set to "0" on every copy
    pub reset_counters: BTreeMap<String, Vec<String>>,
}

impl Default for AmendOptions {
    fn default() -> Self {
        Self {
            layout: ReportLayout::default(),
            cleared_columns: vec!["remoteId".to_string(), "messageId".to_string()],
            reset_counters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmendOutcome {
    /// The stored copy of the root
    pub root: Record,
    pub version: Version,
    /// Copies created per table
    pub created: BTreeMap<String, usize>,
}

impl AmendOutcome {
    pub fn total(&self) -> usize {
        self.created.values().sum()
    }
}

/// Clone `report` and its descendants into a new draft at the next version.
///
/// Runs as one unit of work: under `PartialWriteStands` a failure leaves the
/// copies stored so far, under `AllOrNothing` it leaves nothing.
pub fn amend(session: &Session, report: &Record, options: &AmendOptions) -> Result<AmendOutcome> {
    if report.table() != options.layout.root_table {
        return Err(Error::Amend(format!(
            "{} is not the report table {}",
            report.table(),
            options.layout.root_table
        )));
    }
    report.saved_id()?;

    let outcome = session.unit_of_work(|unit| clone_tree(session, unit, report, options))?;
    tracing::info!(
        "Amended {}#{} into #{} (version {}, {} records)",
        report.table(),
        report.id().unwrap_or_default(),
        outcome.root.id().unwrap_or_default(),
        outcome.version,
        outcome.total()
    );
    Ok(outcome)
}

fn clone_tree(session: &Session, unit: &UnitOfWork, report: &Record, options: &AmendOptions) -> Result<AmendOutcome> {
    let version = kinds::report::version(report, &options.layout)?.next()?;

    // (source node, copy of its parent)
    let mut stack: Vec<(Record, Option<Record>)> = vec![(report.clone(), None)];
    let mut copies: HashMap<(String, i64), Record> = HashMap::new();
    let mut created: BTreeMap<String, usize> = BTreeMap::new();
    let mut root = None;

    while let Some((source, new_parent)) = stack.pop() {
        let source_id = source.saved_id()?;
        let key = (source.table().to_string(), source_id);
        let store = session.store_in(unit, source.table())?;

        if let Some(existing) = copies.get_mut(&key) {
            // Reached again through another parent table
            if let Some(parent) = &new_parent {
                inject_parent(parent, existing)?;
                if !store.update(existing)? {
                    tracing::warn!("Could not re-parent copy of {}#{} to {}", key.0, source_id, parent.table());
                }
            }
            continue;
        }

        let mut copy = source.duplicate();
        match &new_parent {
            Some(parent) => inject_parent(parent, &mut copy)?,
            None => prepare_root(&mut copy, version, options)?,
        }
        if let Some(columns) = options.reset_counters.get(copy.table()) {
            for column in columns {
                copy.put_text(column, "0")?;
            }
        }

        if store.add(&mut copy)?.is_none() {
            return Err(Error::Amend(format!("could not store the copy of {}#{}", key.0, source_id)));
        }
        tracing::debug!("Copied {}#{} to #{}", key.0, source_id, copy.id().unwrap_or_default());
        *created.entry(key.0.clone()).or_default() += 1;

        for relation in source.schema().child_relations() {
            let children = session
                .store_in(unit, &relation.child)?
                .get_by_parent_id(&relation.parent, source_id)?;
            for child in children {
                stack.push((child, Some(copy.clone())));
            }
        }

        if new_parent.is_none() {
            root = Some(copy.clone());
        }
        copies.insert(key, copy);
    }

    let root = root.ok_or_else(|| Error::Amend("the report was not copied".to_string()))?;
    Ok(AmendOutcome { root, version, created })
}

fn prepare_root(copy: &mut Record, version: Version, options: &AmendOptions) -> Result<()> {
    let layout = &options.layout;
    kinds::report::set_version(copy, layout, version)?;
    kinds::report::set_status(copy, layout, &layout.draft_status)?;
    for column in &options.cleared_columns {
        if copy.schema().column(column).is_some() {
            copy.remove(column)?;
        } else {
            tracing::debug!("{} has no column {}, nothing to clear", copy.table(), column);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, Relation, Schema, SemanticType, TableSchema};
    use crate::storage::{Atomicity, StoreConfig};

    fn text(id: &str, order: i64) -> ColumnDefinition {
        ColumnDefinition::new(id, SemanticType::String).with_order(order)
    }

    fn fk(id: &str) -> ColumnDefinition {
        ColumnDefinition::new(id, SemanticType::ForeignKey).with_order(-1)
    }

    fn schema() -> Schema {
        Schema::new(
            vec![
                TableSchema::new(
                    "Report",
                    vec![text("version", 0), text("status", 1), text("senderId", 2), text("remoteId", 3)],
                ),
                TableSchema::new("Summary", vec![fk("ReportId"), text("totalUnits", 0), text("matrix", 1)]),
                TableSchema::new("Case", vec![fk("SummaryId"), text("sampId", 0)]),
                TableSchema::new("Result", vec![fk("CaseId"), text("value", 0)]),
            ],
            vec![
                Relation::new("Report", "Summary"),
                Relation::new("Summary", "Case"),
                Relation::new("Case", "Result"),
            ],
        )
        .unwrap()
    }

    fn options() -> AmendOptions {
        let mut options = AmendOptions::default();
        options.reset_counters.insert("Summary".to_string(), vec!["totalUnits".to_string()]);
        options
    }

    fn add(session: &Session, table: &str, parent: Option<&Record>, values: &[(&str, &str)]) -> Record {
        let mut record = session.new_record(table).unwrap();
        for (column, value) in values {
            record.put_text(column, *value).unwrap();
        }
        if let Some(parent) = parent {
            session.inject_parent(parent, &mut record).unwrap();
        }
        session.store(table).unwrap().add(&mut record).unwrap();
        record
    }

    /// Report with 2 summaries, 3 cases and 4 results
    fn populate(session: &Session) -> Record {
        let report = add(
            session,
            "Report",
            None,
            &[("version", "00"), ("status", "SUBMITTED"), ("senderId", "IT-1"), ("remoteId", "R-77")],
        );
        let s1 = add(session, "Summary", Some(&report), &[("totalUnits", "12"), ("matrix", "milk")]);
        let s2 = add(session, "Summary", Some(&report), &[("totalUnits", "3"), ("matrix", "eggs")]);
        let c1 = add(session, "Case", Some(&s1), &[("sampId", "a")]);
        let c2 = add(session, "Case", Some(&s1), &[("sampId", "b")]);
        let c3 = add(session, "Case", Some(&s2), &[("sampId", "c")]);
        add(session, "Result", Some(&c1), &[("value", "1")]);
        add(session, "Result", Some(&c1), &[("value", "2")]);
        add(session, "Result", Some(&c2), &[("value", "3")]);
        add(session, "Result", Some(&c3), &[("value", "4")]);
        report
    }

    fn open(dir: &tempfile::TempDir, config: StoreConfig) -> Session {
        let session = Session::open(dir.path().join("data.db"), schema(), config).unwrap();
        session.initialize().unwrap();
        session
    }

    /// Child counts below `record`, level by level, in identity order
    fn shape(session: &Session, record: &Record) -> Vec<usize> {
        let mut counts = Vec::new();
        let mut level = vec![record.clone()];
        for child_table in ["Summary", "Case", "Result"] {
            let mut next = Vec::new();
            for parent in &level {
                let children = kinds::children(session, parent, child_table).unwrap();
                counts.push(children.len());
                next.extend(children);
            }
            level = next;
        }
        counts
    }

    #[test]
    fn test_amend_copies_tree() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = populate(&session);

        let outcome = amend(&session, &report, &options()).unwrap();
        let copy = &outcome.root;

        assert_eq!(outcome.version, Version::new(1));
        assert_eq!(copy.code("version").unwrap(), "01");
        assert_eq!(copy.code("status").unwrap(), "DRAFT");
        assert_eq!(copy.code("senderId").unwrap(), "IT-1");
        assert!(copy.get("remoteId").unwrap().is_none());
        assert_eq!(outcome.created["Result"], 4);
        assert_eq!(outcome.total(), 10);

        let mut expected = shape(&session, &report);
        let mut actual = shape(&session, copy);
        // The copy is built from a LIFO walk, so siblings may come back in another order
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_amend_gives_new_identities_and_resets_counters() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = populate(&session);
        let outcome = amend(&session, &report, &options()).unwrap();

        for table in ["Report", "Summary", "Case", "Result"] {
            let rows = session.store(table).unwrap().get_all().unwrap();
            assert_eq!(rows.len() % 2, 0, "{} should have doubled", table);
        }

        let old_summaries = kinds::children(&session, &report, "Summary").unwrap();
        let new_summaries = kinds::children(&session, &outcome.root, "Summary").unwrap();
        assert_eq!(new_summaries.len(), 2);
        for summary in &new_summaries {
            assert!(old_summaries.iter().all(|old| old.id() != summary.id()));
            assert_eq!(summary.code("totalUnits").unwrap(), "0");
        }
        let mut matrices: Vec<&str> = new_summaries.iter().map(|s| s.code("matrix").unwrap()).collect();
        matrices.sort();
        assert_eq!(matrices, vec!["eggs", "milk"]);

        // The source is untouched
        let source = session.store("Report").unwrap().get_by_id(report.id().unwrap()).unwrap().unwrap();
        assert_eq!(source.code("remoteId").unwrap(), "R-77");
        assert!(old_summaries.iter().all(|s| s.code("totalUnits").unwrap() != "0"));
    }

    #[test]
    fn test_amend_twice_bumps_version_again() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = populate(&session);
        let first = amend(&session, &report, &options()).unwrap();
        let second = amend(&session, &first.root, &options()).unwrap();
        assert_eq!(second.root.code("version").unwrap(), "02");

        let previous = kinds::report::find_previous(&session, &second.root, &options().layout)
            .unwrap()
            .unwrap();
        assert_eq!(previous.id(), first.root.id());
    }

    fn failing_options() -> AmendOptions {
        let mut options = options();
        options.reset_counters.insert("Case".to_string(), vec!["missing".to_string()]);
        options
    }

    #[test]
    fn test_failure_leaves_partial_copy() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = populate(&session);

        assert!(amend(&session, &report, &failing_options()).is_err());
        assert_eq!(session.store("Report").unwrap().count().unwrap(), 2);
        assert_eq!(session.store("Case").unwrap().count().unwrap(), 3);
    }

    #[test]
    fn test_failure_rolls_back_when_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            atomicity: Atomicity::AllOrNothing,
            ..StoreConfig::default()
        };
        let session = open(&dir, config);
        let report = populate(&session);

        assert!(amend(&session, &report, &failing_options()).is_err());
        assert_eq!(session.store("Report").unwrap().count().unwrap(), 1);
        assert_eq!(session.store("Summary").unwrap().count().unwrap(), 2);
    }

    #[test]
    fn test_amend_rejects_non_report() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = populate(&session);
        let summary = kinds::children(&session, &report, "Summary").unwrap().remove(0);
        assert!(matches!(amend(&session, &summary, &options()), Err(Error::Amend(_))));
    }

    #[test]
    fn test_last_version_cannot_be_amended() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(&dir, StoreConfig::default());
        let report = add(&session, "Report", None, &[("version", "4294967295"), ("senderId", "IT-1")]);

        assert!(matches!(amend(&session, &report, &options()), Err(Error::Version(_))));
        assert_eq!(session.store("Report").unwrap().count().unwrap(), 1);
    }
}
