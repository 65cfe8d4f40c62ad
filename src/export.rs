//! Hierarchy Flattener - one flat, ancestor-enriched output row per leaf
//!
//! The walk is depth-first over an explicit stack of indices into an arena
//! of fetched records. Children are pushed in identity order and the stack
//! is LIFO, so the last child discovered is drained first: sibling subtrees
//! come out in reverse identity order. Which leaves are produced does not
//! depend on this order.
//!
//! Every stack entry carries its depth. The ancestor list is cut to that
//! depth before a node is emitted or recorded, so it only ever holds the
//! active path from the root: a node recorded at depth `d` replaces the
//! previous entry at `d` and drops everything deeper, whether that belonged
//! to a sibling or to a sibling relation's subtree.

use std::collections::HashMap;
use std::io::Write;
use serde::Serialize;
use crate::catalog::Catalog;
use crate::record::Record;
use crate::schema::Schema;
use crate::session::Session;
use crate::storage::{RecordStore, Source};
use crate::Result;

/// One output unit: `(output tag, code)` pairs, ancestors first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlatRecord {
    pub fields: Vec<(String, String)>,
}

impl FlatRecord {
    /// First value emitted under `tag`
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.iter().find(|(t, _)| t == tag).map(|(_, v)| v.as_str())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct Flattener<'a> {
    schema: &'a Schema,
    source: Source<'a>,
    catalog: &'a dyn Catalog,
}

impl<'a> Flattener<'a> {
    pub fn new(schema: &'a Schema, source: Source<'a>, catalog: &'a dyn Catalog) -> Self {
        Self { schema, source, catalog }
    }

    pub fn for_session(session: &'a Session) -> Self {
        Self::new(session.schema(), Source::Database(session.database()), session.catalog())
    }

    /// Flatten the tree below `root` (which must be stored)
    pub fn flatten(&self, root: Record) -> Result<Vec<FlatRecord>> {
        let mut stores: HashMap<String, RecordStore<'a>> = HashMap::new();
        let mut arena: Vec<Record> = vec![root];
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        let mut ancestors: Vec<usize> = Vec::new();
        let mut output = Vec::new();

        while let Some((index, depth)) = stack.pop() {
            ancestors.truncate(depth);
            let table = arena[index].schema().clone();
            if table.child_relations().is_empty() {
                output.push(emit(&arena, &ancestors, index));
                continue;
            }

            let id = arena[index].saved_id()?;
            for relation in table.child_relations() {
                if !stores.contains_key(&relation.child) {
                    let child_schema = self.schema.table(&relation.child)?.clone();
                    stores.insert(
                        relation.child.clone(),
                        RecordStore::new(child_schema, self.source, self.catalog),
                    );
                }
                let store = &stores[&relation.child];
                let children = store.get_by_parent_id(&relation.parent, id)?;

                if children.is_empty() {
                    tracing::debug!("{}#{} has no {} rows, emitted as leaf", table.name(), id, relation.child);
                    ancestors.truncate(depth);
                    output.push(emit(&arena, &ancestors, index));
                    continue;
                }

                for child in children {
                    arena.push(child);
                    stack.push((arena.len() - 1, depth + 1));
                }
                record_ancestor(&mut ancestors, depth, index);
            }
        }

        tracing::info!("Flattened {} records into {} rows", arena.len(), output.len());
        Ok(output)
    }
}

fn record_ancestor(ancestors: &mut Vec<usize>, depth: usize, index: usize) {
    ancestors.truncate(depth);
    ancestors.push(index);
}

fn emit(arena: &[Record], ancestors: &[usize], node: usize) -> FlatRecord {
    let mut fields = Vec::new();
    for row in ancestors.iter().copied().chain(std::iter::once(node)) {
        let record = &arena[row];
        for key in record.schema().declared_keys() {
            let Some(definition) = record.schema().definition(key) else {
                continue;
            };
            if !definition.put_in_output {
                continue;
            }
            let code = record.get_key(key).map(|v| v.code.clone()).unwrap_or_default();
            fields.push((definition.output_tag.clone(), code));
        }
    }
    FlatRecord { fields }
}

/// Escape text for XML element content and attributes
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Write rows as `<dataset><result><tag>value</tag>...</result>...</dataset>`
pub fn write_dataset(records: &[FlatRecord], out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(out, "<dataset>")?;
    for record in records {
        write!(out, "<result>")?;
        for (tag, value) in &record.fields {
            write!(out, "<{}>{}</{}>", tag, escape_xml(value), tag)?;
        }
        writeln!(out, "</result>")?;
    }
    writeln!(out, "</dataset>")?;
    Ok(())
}
