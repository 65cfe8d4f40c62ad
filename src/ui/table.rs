use std::collections::BTreeMap;
use tabled::{settings::Style, Table, Tabled};
use crate::compiler::{Dialect, MigrationStatement};
use crate::storage::DbStats;

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Rows")]
    rows: usize,
}

#[derive(Tabled)]
struct StatementRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "SQL")]
    sql: String,
}

/// Rows per table, from database statistics or an import/amend tally
pub fn counts_table<'a>(counts: impl IntoIterator<Item = (&'a str, usize)>) -> String {
    let rows: Vec<CountRow> = counts
        .into_iter()
        .map(|(table, rows)| CountRow {
            table: table.to_string(),
            rows,
        })
        .collect();
    if rows.is_empty() {
        return String::new();
    }
    Table::new(&rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &DbStats) -> String {
    counts_table(stats.tables.iter().map(|(t, n)| (t.as_str(), *n)))
}

pub fn created_table(created: &BTreeMap<String, usize>) -> String {
    counts_table(created.iter().map(|(t, n)| (t.as_str(), *n)))
}

pub fn statements_table(statements: &[MigrationStatement], dialect: Dialect) -> String {
    let rows: Vec<StatementRow> = statements
        .iter()
        .enumerate()
        .map(|(i, s)| StatementRow {
            index: i + 1,
            change: s.to_string(),
            sql: s.to_sql(dialect).join("\n"),
        })
        .collect();
    if rows.is_empty() {
        return String::new();
    }
    Table::new(&rows).with(Style::rounded()).to_string()
}
