use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Context;
use recordtree::amend;
use recordtree::catalog::{Catalog, InMemoryCatalog, NoCatalog};
use recordtree::compiler::{self, Dialect};
use recordtree::config::{self, RecordtreeConfig};
use recordtree::export::{self, Flattener};
use recordtree::formula::NoFormulas;
use recordtree::import;
use recordtree::ui::{self, table, Icons};
use recordtree::worker::{self, JobOutcome};
use recordtree::{Database, Schema, Session, Strictness};
use crate::Target;

fn load_config(config_path: Option<&Path>) -> anyhow::Result<RecordtreeConfig> {
    Ok(config::load_config(config_path)?.unwrap_or_default())
}

fn schema_path(flag: Option<PathBuf>, config: &RecordtreeConfig) -> anyhow::Result<PathBuf> {
    flag.or_else(|| config.schema.as_ref().map(PathBuf::from))
        .context("no definition workbook: pass --schema or set `schema` in recordtree.toml")
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    Schema::load(path).with_context(|| format!("loading definitions from {}", path.display()))
}

fn open_session(config_path: Option<&Path>, target: &Target) -> anyhow::Result<(Session, RecordtreeConfig)> {
    let config = load_config(config_path)?;
    let schema = load_schema(&schema_path(target.schema.clone(), &config)?)?;
    let database = target
        .database
        .clone()
        .or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config::default_database_path_in(Path::new(".")));

    let mut store = config.store_config();
    if target.strict {
        store.strictness = Strictness::Strict;
    }

    config::ensure_db_dir(&database)?;
    let db = Database::open(&database, store)
        .with_context(|| format!("opening database {}", database.display()))?;

    let catalog: Arc<dyn Catalog> = match &config.catalog {
        Some(path) => Arc::new(InMemoryCatalog::load(Path::new(path))?),
        None => Arc::new(NoCatalog),
    };

    tracing::debug!("Session on {} with {} tables", database.display(), schema.tables().len());
    Ok((Session::new(db, Arc::new(schema), catalog), config))
}

fn root_record(session: &Session, table: &str, id: i64) -> anyhow::Result<recordtree::Record> {
    session
        .store(table)?
        .get_by_id(id)?
        .with_context(|| format!("{} #{} not found", table, id))
}

pub fn run_init(
    config_path: Option<&Path>,
    schema: PathBuf,
    database: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    let uses_default_database = database.is_none();
    let database = database.unwrap_or_else(|| config::default_database_path_in(Path::new(".")));

    let definitions = load_schema(&schema)?;
    let config = RecordtreeConfig {
        database: Some(database.to_string_lossy().to_string()),
        schema: Some(schema.to_string_lossy().to_string()),
        ..Default::default()
    };
    config::write_config(&path, &config, force)?;
    config::ensure_db_dir(&database)?;
    if uses_default_database {
        config::ensure_gitignore(Path::new("."))?;
    }

    let db = Database::open(&database, config.store_config())?;
    let report = db.migrate(&definitions)?;

    ui::header("Recordtree initialized");
    ui::info("Config", &path.display().to_string());
    ui::info(Icons::DATABASE, &database.display().to_string());
    ui::summary_row("Tables", &definitions.tables().len().to_string());
    ui::summary_row("Statements", &report.statements.to_string());
    Ok(())
}

pub fn run_ddl(
    config_path: Option<&Path>,
    schema: Option<PathBuf>,
    dialect: Dialect,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let definitions = load_schema(&schema_path(schema, &config)?)?;
    let script = compiler::generate_create_statements(&definitions, dialect);

    match output {
        Some(path) => {
            std::fs::write(&path, script)?;
            ui::success(&format!("Wrote {} script to {}", dialect, path.display()));
        }
        None => print!("{}", script),
    }
    Ok(())
}

pub fn run_migrate(config_path: Option<&Path>, target: &Target, dry_run: bool, dialect: Dialect) -> anyhow::Result<()> {
    let (session, _) = open_session(config_path, target)?;
    let plan = session.database().plan(session.schema())?;

    if plan.is_empty() {
        ui::success("Database is up to date");
        return Ok(());
    }

    ui::section(" Planned changes ");
    println!("{}", table::statements_table(&plan, dialect));
    if dry_run {
        ui::warn("Dry run, nothing applied");
        return Ok(());
    }

    let report = session.database().apply(&plan)?;
    ui::success(&format!("Applied {} changes ({} statements)", plan.len(), report.executed));
    Ok(())
}

pub fn run_import(config_path: Option<&Path>, target: &Target, file: PathBuf) -> anyhow::Result<()> {
    let (session, _) = open_session(config_path, target)?;
    session.initialize()?;
    let nodes = import::load_document(&file)?;
    let total: usize = nodes.iter().map(|n| n.size()).sum();
    ui::header(&format!("Importing {} records from {}", total, file.display()));

    let (tx, rx) = crossbeam::channel::bounded(1);
    let handle = worker::spawn_job(
        "import",
        move || import::import_tree(&session, &nodes, &NoFormulas),
        move |outcome| {
            tx.send(outcome).ok();
        },
    )?;
    handle.join();

    match rx.recv()? {
        JobOutcome::Completed(report) => {
            println!("{}", table::created_table(&report.created));
            ui::success(&format!("Imported {} records", report.total()));
            for root in &report.roots {
                ui::summary_row(root.table(), &format!("#{}", root.id().unwrap_or_default()));
            }
            Ok(())
        }
        JobOutcome::Failed(e) => Err(e).context("import failed"),
    }
}

pub fn run_export(
    config_path: Option<&Path>,
    target: &Target,
    id: i64,
    table: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (session, config) = open_session(config_path, target)?;
    let table = table.unwrap_or_else(|| config.amend.layout.root_table.clone());
    let root = root_record(&session, &table, id)?;
    let rows = Flattener::for_session(&session).flatten(root)?;

    match output {
        Some(path) => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
            export::write_dataset(&rows, &mut file)?;
            ui::success(&format!("Exported {} rows to {}", rows.len(), path.display()));
        }
        None => {
            let stdout = std::io::stdout();
            export::write_dataset(&rows, &mut stdout.lock())?;
        }
    }
    Ok(())
}

pub fn run_amend(config_path: Option<&Path>, target: &Target, id: i64) -> anyhow::Result<()> {
    let (session, config) = open_session(config_path, target)?;
    let report = root_record(&session, &config.amend.layout.root_table, id)?;
    let outcome = amend::amend(&session, &report, &config.amend)?;

    ui::success(&format!(
        "Amended {} #{} into #{} (version {})",
        report.table(),
        id,
        outcome.root.id().unwrap_or_default(),
        outcome.version
    ));
    println!("{}", table::created_table(&outcome.created));
    Ok(())
}

pub fn run_stats(config_path: Option<&Path>, target: &Target) -> anyhow::Result<()> {
    let (session, _) = open_session(config_path, target)?;
    let stats = session.database().stats(session.schema())?;
    ui::section(" Database Statistics ");
    ui::info(Icons::DATABASE, &session.database().path().display().to_string());
    println!("{}", table::stats_table(&stats));
    Ok(())
}
