//! docsync command-line tool.
//!
//! Provides subcommands for editing stored documentation, exporting it to a
//! portable file, and importing another user's file with conflict-aware
//! merging.

mod merge_view;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use docsync_core::codec::{self, Compression};
use docsync_core::config::AppConfig;
use docsync_core::db::Database;
use docsync_core::editor;
use docsync_core::errors::{ApplyError, SyncError};
use docsync_core::merge::{self, ApplyPlan, MergeFrom};
use docsync_core::store::EntityStore;
use docsync_core::sync_engine::SyncEngine;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// docsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "docsync",
    version,
    about = "Keep symbol documentation locally and exchange it with others"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./docsync.toml")]
        output: PathBuf,
    },

    /// List stored documentation records.
    List,

    /// Print one record as JSON.
    Show {
        /// Class id.
        id: u64,
    },

    /// Set or clear a class description.
    SetBody {
        /// Class id.
        id: u64,
        /// New description; omit to clear.
        text: Option<String>,
    },

    /// Set or clear a member note.
    SetMember {
        /// Class id.
        class_id: u64,
        /// Member id.
        member_id: u64,
        /// New note; omit to clear.
        text: Option<String>,
    },

    /// Delete a class and all of its notes.
    Remove {
        /// Class id.
        id: u64,
    },

    /// Write all stored documentation to a file.
    Export {
        #[arg(short, long)]
        output: PathBuf,

        /// Write the payload uncompressed.
        #[arg(long)]
        no_compress: bool,
    },

    /// Show what importing a file would change.
    Diff {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Merge a documentation file into the local store.
    Import {
        #[arg(short, long)]
        input: PathBuf,

        /// Overwrite the whole local set instead of merging.
        #[arg(long, conflicts_with_all = ["accept", "interactive"])]
        replace: bool,

        /// Resolve every conflict to one side.
        #[arg(long, value_enum, conflicts_with = "interactive")]
        accept: Option<Side>,

        /// Ask for each conflict.
        #[arg(long)]
        interactive: bool,

        /// Show the outcome without writing.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    Local,
    Incoming,
}

impl From<Side> for MergeFrom {
    fn from(side: Side) -> Self {
        match side {
            Side::Local => MergeFrom::Local,
            Side::Incoming => MergeFrom::Incoming,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    let engine = || open_engine(config, config.export.compression);
    match command {
        Commands::Init { output } => cmd_init(&output),
        Commands::List => cmd_list(engine()?.store()),
        Commands::Show { id } => cmd_show(engine()?.store(), id),
        Commands::SetBody { id, text } => {
            editor::set_class_body(engine()?.store(), id, text)
                .context("failed to update class description")?;
            println!("{}", style::success(&format!("Class {id} updated")));
            Ok(())
        }
        Commands::SetMember {
            class_id,
            member_id,
            text,
        } => {
            editor::set_member_body(engine()?.store(), class_id, member_id, text)
                .context("failed to update member note")?;
            println!(
                "{}",
                style::success(&format!("Member {member_id} of class {class_id} updated"))
            );
            Ok(())
        }
        Commands::Remove { id } => {
            editor::remove_class(engine()?.store(), id).context("failed to remove class")?;
            println!("{}", style::success(&format!("Class {id} removed")));
            Ok(())
        }
        Commands::Export {
            output,
            no_compress,
        } => {
            let compression = if no_compress {
                Compression::None
            } else {
                config.export.compression
            };
            let engine = open_engine(config, compression)?;
            let count = engine
                .export_to_file(&output)
                .context("failed to export documentation")?;
            println!(
                "{}",
                style::success(&format!("Exported {count} record(s) to {}", output.display()))
            );
            println!(
                "{}",
                style::dim(&format!(
                    "compression: {}, content type: {}",
                    engine.compression(),
                    codec::CONTENT_TYPE
                ))
            );
            Ok(())
        }
        Commands::Diff { input } => {
            let engine = engine()?;
            let incoming = engine
                .read_incoming_file(&input)
                .context("failed to read documentation file")?;
            let operations = engine.plan_merge(&incoming).context("failed to diff")?;
            if operations.is_empty() {
                println!("{}", style::success("Already up to date"));
            } else {
                merge_view::print_tree(&operations);
            }
            Ok(())
        }
        Commands::Import {
            input,
            replace,
            accept,
            interactive,
            dry_run,
        } => cmd_import(&engine()?, &input, replace, accept, interactive, dry_run),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docsync").join("config.toml"))
}

/// Load the given config file, or the default location when it exists, or
/// fall back to built-in defaults.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            AppConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                AppConfig::load_from_file(&path).context("failed to load configuration file")?
            }
            None => AppConfig::default(),
        },
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_engine(config: &AppConfig, compression: Compression) -> Result<SyncEngine<Database>> {
    let path = config.database_path();
    debug!(path = %path.display(), %compression, "opening documentation store");
    let db = Database::new(&path).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(SyncEngine::new(db, compression))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# docsync configuration

[storage]
# data_dir = "/path/to/data"     # defaults to the platform data directory
database_file = "docsync.db"

[export]
compression = "lz4"              # "lz4" or "none"

[logging]
level = "info"                   # trace, debug, info, warn, error
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;
    println!("Default configuration written to {}", output.display());
    Ok(())
}

fn cmd_list(db: &Database) -> Result<()> {
    let records = db.find_all().context("failed to list documentation")?;
    if records.is_empty() {
        println!("No documentation stored.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Class", "Description", "Members"]);
    for record in &records {
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(
                record
                    .body
                    .as_deref()
                    .map_or_else(|| "—".into(), |b| style::preview(b, 60)),
            ),
            Cell::new(record.members().len()),
        ]);
    }

    println!("{table}");
    println!("{} record(s)", records.len());
    Ok(())
}

fn cmd_show(db: &Database, id: u64) -> Result<()> {
    let record = db
        .find_by_id(id)
        .context("database error")?
        .ok_or_else(|| anyhow::anyhow!("no documentation for class {}", id))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_import(
    engine: &SyncEngine<Database>,
    input: &Path,
    replace: bool,
    accept: Option<Side>,
    interactive: bool,
    dry_run: bool,
) -> Result<()> {
    let incoming = engine
        .read_incoming_file(input)
        .context("failed to read documentation file")?;

    if replace {
        if dry_run {
            println!(
                "Would replace {} local record(s) with {} incoming record(s)",
                engine.store().count()?,
                incoming.len()
            );
            return Ok(());
        }
        let written = engine
            .replace_all(&incoming)
            .context("failed to replace documentation")?;
        println!(
            "{}",
            style::success(&format!("Replaced local documentation with {written} record(s)"))
        );
        return Ok(());
    }

    let mut operations = engine.plan_merge(&incoming).context("failed to diff")?;
    if operations.is_empty() {
        println!("{}", style::success("Already up to date"));
        return Ok(());
    }
    merge_view::print_tree(&operations);

    if let Some(side) = accept {
        merge::resolve_all(&mut operations, side.into());
    } else if interactive {
        merge_view::resolve_interactively(&mut operations)?;
    }

    let unresolved = merge::unresolved_total(&operations);
    if unresolved > 0 {
        anyhow::bail!(
            "{} conflict(s) unresolved; rerun with --accept or --interactive",
            unresolved
        );
    }

    if dry_run {
        let plan = ApplyPlan::build(&operations);
        println!(
            "Would apply {} deletion(s), {} addition(s), {} modification(s)",
            plan.deletions.len(),
            plan.additions.len(),
            plan.modifications.len()
        );
        return Ok(());
    }

    match engine.apply(&operations) {
        Ok(summary) => {
            println!(
                "{}",
                style::success(&format!(
                    "Merged: {} created, {} updated, {} deleted",
                    summary.created, summary.updated, summary.deleted
                ))
            );
            if summary.skipped > 0 {
                println!(
                    "{}",
                    style::warn(&format!(
                        "{} record(s) changed underneath the merge and were skipped",
                        summary.skipped
                    ))
                );
            }
            Ok(())
        }
        Err(SyncError::Apply(ApplyError::PartialFailure(failures))) => {
            for (id, err) in &failures {
                eprintln!("{}", style::error(&format!("class {id}: {err}")));
            }
            anyhow::bail!(
                "{} record(s) failed; run the import again to retry them",
                failures.len()
            )
        }
        Err(e) => Err(e).context("failed to apply merge"),
    }
}
