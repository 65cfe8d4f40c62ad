//! Free functions over records of a particular role in the hierarchy

use serde::{Deserialize, Serialize};
use crate::record::Record;
use crate::session::Session;
use crate::Result;

/// Where the report-kind fields live in the root table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLayout {
    pub root_table: String,
    pub version_column: String,
    pub status_column: String,
    pub draft_status: String,
    /// External sender identifier shared by every version of one report
    pub sender_column: String,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            root_table: "Report".to_string(),
            version_column: "version".to_string(),
            status_column: "status".to_string(),
            draft_status: "DRAFT".to_string(),
            sender_column: "senderId".to_string(),
        }
    }
}

/// Children of `parent` in `child_table`
pub fn children(session: &Session, parent: &Record, child_table: &str) -> Result<Vec<Record>> {
    session
        .store(child_table)?
        .get_by_parent_id(parent.table(), parent.saved_id()?)
}

pub mod report {
    use super::ReportLayout;
    use crate::record::{CellValue, Record};
    use crate::session::Session;
    use crate::version::{self, Version};
    use crate::Result;

    /// Version of a report; a report without one is at the first version
    pub fn version(report: &Record, layout: &ReportLayout) -> Result<Version> {
        let code = report.code(&layout.version_column)?;
        if code.is_empty() {
            return Ok(Version::FIRST);
        }
        code.parse()
    }

    pub fn set_version(report: &mut Record, layout: &ReportLayout, version: Version) -> Result<()> {
        report.put(&layout.version_column, CellValue::text(version.to_string()))
    }

    pub fn status<'r>(report: &'r Record, layout: &ReportLayout) -> Result<&'r str> {
        report.code(&layout.status_column)
    }

    pub fn set_status(report: &mut Record, layout: &ReportLayout, status: &str) -> Result<()> {
        report.put(&layout.status_column, CellValue::text(status))
    }

    pub fn is_draft(report: &Record, layout: &ReportLayout) -> Result<bool> {
        Ok(status(report, layout)? == layout.draft_status)
    }

    pub fn sender_id<'r>(report: &'r Record, layout: &ReportLayout) -> Result<&'r str> {
        report.code(&layout.sender_column)
    }

    /// The stored report sharing `report`'s sender id whose version comes
    /// right before `report`'s version
    pub fn find_previous(session: &Session, report: &Record, layout: &ReportLayout) -> Result<Option<Record>> {
        let sender = sender_id(report, layout)?.to_string();
        let current = version(report, layout)?;
        if current.is_first() {
            return Ok(None);
        }

        let mut candidates = Vec::new();
        for stored in session.store(&layout.root_table)?.get_all()? {
            if sender_id(&stored, layout)? != sender {
                continue;
            }
            match version(&stored, layout) {
                Ok(v) => candidates.push((v, stored)),
                Err(e) => tracing::warn!("Skipping report {:?}: {}", stored.id(), e),
            }
        }

        let known: Vec<Version> = candidates.iter().map(|(v, _)| *v).collect();
        let Some(previous) = version::previous_version(current, &known) else {
            return Ok(None);
        };
        Ok(candidates
            .into_iter()
            .find(|(v, _)| *v == previous)
            .map(|(_, record)| record))
    }
}

pub mod case {
    use crate::record::Record;
    use crate::session::Session;
    use crate::Result;

    pub const TABLE: &str = "Case";
    pub const SUMMARY_TABLE: &str = "Summary";

    /// Cases of one summary
    pub fn of_summary(session: &Session, summary: &Record) -> Result<Vec<Record>> {
        super::children(session, summary, TABLE)
    }

    /// The summary a case belongs to, through the session's relation cache
    pub fn summary(session: &mut Session, case: &Record) -> Result<Option<Record>> {
        session.parent_of_record(case, SUMMARY_TABLE)
    }

    pub fn results(session: &Session, case: &Record) -> Result<Vec<Record>> {
        super::children(session, case, super::result::TABLE)
    }
}

pub mod result {
    use crate::record::Record;
    use crate::session::Session;
    use crate::Result;

    pub const TABLE: &str = "Result";

    pub fn case(session: &mut Session, result: &Record) -> Result<Option<Record>> {
        session.parent_of_record(result, super::case::TABLE)
    }
}
