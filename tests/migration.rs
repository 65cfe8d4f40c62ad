//! Old -> new schema migration on a real SQLite file

use recordtree::compiler::{self, Dialect, MigrationStatement, PhysicalSchema};
use recordtree::schema::Workbook;
use recordtree::{Database, Schema, StoreConfig};

const OLD: &str = r#"
[[sheet]]
name = "Settings"
headers = ["id"]
rows = [["country"]]

[[sheet]]
name = "Report"
headers = ["id", "type"]
rows = [["SettingsId", "FOREIGN_KEY"], ["year", "STRING"]]

[[sheet]]
name = "Case"
headers = ["id", "type"]
rows = [["ReportId", "FOREIGN_KEY"], ["sampId", "STRING"]]

[[sheet]]
name = "Relations"
headers = ["parentTable", "childTable"]
rows = [["Settings", "Report"], ["Report", "Case"]]
"#;

// Report no longer hangs off Settings, Case gains a lab, Result is new
const NEW: &str = r#"
[[sheet]]
name = "Settings"
headers = ["id"]
rows = [["country"]]

[[sheet]]
name = "Lab"
headers = ["id"]
rows = [["labName"]]

[[sheet]]
name = "Report"
headers = ["id", "type"]
rows = [["SettingsId", "FOREIGN_KEY"], ["year", "STRING"], ["version", "STRING"]]

[[sheet]]
name = "Case"
headers = ["id", "type"]
rows = [["ReportId", "FOREIGN_KEY"], ["sampId", "STRING"], ["LabId", "FOREIGN_KEY"]]

[[sheet]]
name = "Result"
headers = ["id", "type"]
rows = [["CaseId", "FOREIGN_KEY"], ["resVal", "STRING"]]

[[sheet]]
name = "Relations"
headers = ["parentTable", "childTable"]
rows = [["Report", "Case"], ["Lab", "Case"], ["Case", "Result"]]
"#;

fn schema(source: &str) -> Schema {
    Schema::from_workbook(&Workbook::from_toml(source).unwrap()).unwrap()
}

fn populated_database(dir: &tempfile::TempDir) -> Database {
    let db = Database::open(dir.path().join("records.db"), StoreConfig::default()).unwrap();
    db.migrate(&schema(OLD)).unwrap();
    let conn = db.connect().unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO "Settings" ("country") VALUES ('IT');
        INSERT INTO "Report" ("SettingsId", "year") VALUES (1, '2023');
        INSERT INTO "Case" ("ReportId", "sampId") VALUES (1, 'S1');
        "#,
    )
    .unwrap();
    db
}

#[test]
fn plan_against_live_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = populated_database(&dir);

    let plan = db.plan(&schema(NEW)).unwrap();
    let described: Vec<String> = plan.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        described,
        vec![
            "create table Lab",
            "drop foreign key Report.SettingsId -> Settings",
            "add column Report.version",
            "add column Case.LabId",
            "add foreign key Case.LabId -> Lab",
            "create table Result",
        ]
    );
    assert_eq!(plan, compiler::diff_schemas(&schema(OLD), &schema(NEW)));
}

#[test]
fn migration_is_additive_and_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db = populated_database(&dir);
    db.migrate(&schema(NEW)).unwrap();

    let physical = db.physical_schema().unwrap();
    assert!(physical.get("Result").is_some());

    let case = physical.get("Case").unwrap();
    assert_eq!(case.column("LabId").unwrap().references.as_deref(), Some("Lab"));
    assert_eq!(case.column("ReportId").unwrap().references.as_deref(), Some("Report"));

    let report = physical.get("Report").unwrap();
    let settings_id = report.column("SettingsId").unwrap();
    assert!(settings_id.references.is_none());
    assert!(report.column("version").is_some());

    let conn = db.connect().unwrap();
    let (settings, year): (i64, String) = conn
        .query_row(r#"SELECT "SettingsId", "year" FROM "Report""#, [], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap();
    assert_eq!((settings, year.as_str()), (1, "2023"));
    let samp: String = conn.query_row(r#"SELECT "sampId" FROM "Case""#, [], |r| r.get(0)).unwrap();
    assert_eq!(samp, "S1");
}

#[test]
fn migration_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db = populated_database(&dir);
    db.migrate(&schema(NEW)).unwrap();
    assert!(db.plan(&schema(NEW)).unwrap().is_empty());

    // The same holds for the in-memory structure
    let mut physical = PhysicalSchema::from_schema(&schema(OLD));
    physical.apply_all(&compiler::diff(&physical.clone(), &schema(NEW)));
    assert!(compiler::diff(&physical, &schema(NEW)).is_empty());
}

#[test]
fn derby_migration_script() {
    let plan = compiler::diff_schemas(&schema(OLD), &schema(NEW));
    let script: Vec<String> = plan.iter().flat_map(|s| s.to_sql(Dialect::Derby)).collect();
    assert_eq!(
        script,
        vec![
            "create table Lab( LabId integer not null primary key generated always as identity (start with 1, increment by 1), labName varchar(1000));",
            "alter table Report drop constraint FK_Report_SettingsId;",
            "alter table Report add column version varchar(1000);",
            "alter table Case add column LabId integer not null default 0;",
            "alter table Case add constraint FK_Case_LabId foreign key (LabId) references Lab(LabId);",
            "create table Result( ResultId integer not null primary key generated always as identity (start with 1, increment by 1), CaseId integer not null, resVal varchar(1000));",
        ]
    );
}

#[test]
fn failing_statement_stops_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let db = populated_database(&dir);

    let mut plan = db.plan(&schema(NEW)).unwrap();
    // Creating Settings again fails after Lab was created
    let settings = PhysicalSchema::from_schema(&schema(OLD)).get("Settings").unwrap().clone();
    plan.insert(1, MigrationStatement::CreateTable(settings));

    let err = db.apply(&plan).unwrap_err();
    assert!(matches!(err, recordtree::Error::Migration { index: 1, .. }));

    let physical = db.physical_schema().unwrap();
    assert!(physical.get("Lab").is_some());
    assert!(physical.get("Result").is_none());
}
