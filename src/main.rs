//! Recordtree CLI - schema-driven hierarchical records over SQLite

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use recordtree::compiler::Dialect;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "recordtree")]
#[command(version)]
#[command(about = "Schema-driven hierarchical record engine")]
#[command(long_about = r#"
Recordtree compiles a definition workbook into database tables and manages
the hierarchical records stored in them:
  • DDL generation and additive migrations
  • Import of nested record documents
  • Flat export of a report tree
  • Amending a report into a new draft version

Example usage:
  recordtree init --schema schema.toml
  recordtree import --file report.json
  recordtree export --id 1 --output report.xml
  recordtree amend --id 1
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Locations shared by every command that opens a database
#[derive(clap::Args, Clone, Debug, Default)]
pub struct Target {
    /// Path to the database file
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Path to the definition workbook
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Fail on storage errors instead of logging them
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Path to the definition workbook
        #[arg(short, long)]
        schema: PathBuf,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print the table creation script
    Ddl {
        /// Path to the definition workbook
        #[arg(short, long)]
        schema: Option<PathBuf>,

        #[arg(long, default_value = "derby")]
        dialect: Dialect,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bring the database structure up to the workbook
    Migrate {
        #[command(flatten)]
        target: Target,

        /// Only print the planned changes
        #[arg(long)]
        dry_run: bool,

        /// Dialect used to print the planned changes
        #[arg(long, default_value = "sqlite")]
        dialect: Dialect,
    },

    /// Import a nested record document (JSON or TOML)
    Import {
        #[command(flatten)]
        target: Target,

        /// Document to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export a report tree as flat records
    Export {
        #[command(flatten)]
        target: Target,

        /// Identity of the report
        #[arg(long)]
        id: i64,

        /// Root table (defaults to the configured report table)
        #[arg(short, long)]
        table: Option<String>,

        /// Write XML to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy a report into a new draft version
    Amend {
        #[command(flatten)]
        target: Target,

        /// Identity of the report
        #[arg(long)]
        id: i64,
    },

    /// Show row counts per table
    Stats {
        #[command(flatten)]
        target: Target,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init { schema, database, force } => commands::run_init(config_path, schema, database, force),
        Commands::Ddl { schema, dialect, output } => commands::run_ddl(config_path, schema, dialect, output),
        Commands::Migrate { target, dry_run, dialect } => commands::run_migrate(config_path, &target, dry_run, dialect),
        Commands::Import { target, file } => commands::run_import(config_path, &target, file),
        Commands::Export { target, id, table, output } => commands::run_export(config_path, &target, id, table, output),
        Commands::Amend { target, id } => commands::run_amend(config_path, &target, id),
        Commands::Stats { target } => commands::run_stats(config_path, &target),
    };

    if let Err(e) = result {
        recordtree::ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
