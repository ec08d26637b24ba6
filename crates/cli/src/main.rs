// Stratus CLI - one snapshot in, five reconciled relations out

mod config;
mod exit_codes;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use stratus_io::{CsvStore, RelationStore, StoreError};
use stratus_recon::schema;
use stratus_recon::snapshot;
use stratus_recon::{run_batch, PriorState, ReconError, Relation};

use config::Settings;
use exit_codes::{EXIT_SNAPSHOT, EXIT_STORE_READ, EXIT_STORE_WRITE, EXIT_SUCCESS, EXIT_USAGE};

/// Error carried up to `main`: message, optional hint, registered exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Weather snapshot reconciliation pipeline")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Path to a stratus.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one snapshot file and update the five persisted relations
    #[command(after_help = "\
Examples:
  stratus run snapshot.json
  stratus run snapshot.json --output-dir state
  stratus run --json")]
    Run {
        /// Input JSON snapshot (falls back to config, then the default)
        input: Option<PathBuf>,

        /// Directory holding the persisted relations
        #[arg(long, env = "STRATUS_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Emit a machine-readable run summary to stdout
        #[arg(long)]
        json: bool,
    },

    /// Parse and typecheck a snapshot file without writing anything
    Validate {
        /// Input JSON snapshot
        input: PathBuf,
    },

    /// Print the first rows of a persisted relation
    #[command(after_help = "\
Examples:
  stratus show stats
  stratus show merged --limit 25")]
    Show {
        /// Relation name: location, current_temp, forecast_temp, merged, stats
        relation: String,

        /// Rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Directory holding the persisted relations
        #[arg(long, env = "STRATUS_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => return fail(err),
    };

    let result = match cli.command {
        Commands::Run {
            input,
            output_dir,
            json,
        } => cmd_run(&settings, input, output_dir, json),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Show {
            relation,
            limit,
            output_dir,
        } => cmd_show(&settings, &relation, limit, output_dir),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => fail(err),
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild: debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild: release",
        )
    }
}

fn fail(err: CliError) -> ExitCode {
    eprintln!("error: {}", err.message);
    if let Some(hint) = err.hint {
        eprintln!("hint:  {hint}");
    }
    ExitCode::from(err.code)
}

fn snapshot_err(err: ReconError) -> CliError {
    CliError {
        code: EXIT_SNAPSHOT,
        message: err.to_string(),
        hint: None,
    }
}

fn store_read_err(err: StoreError) -> CliError {
    CliError {
        code: EXIT_STORE_READ,
        message: err.to_string(),
        hint: Some("prior state is unreadable; nothing was reconciled".into()),
    }
}

fn store_write_err(err: StoreError) -> CliError {
    CliError {
        code: EXIT_STORE_WRITE,
        message: err.to_string(),
        hint: None,
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct RunSummary {
    input: String,
    output_dir: String,
    rows: BTreeMap<&'static str, usize>,
}

fn cmd_run(
    settings: &Settings,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let input = settings.resolve_input(input);
    let output_dir = settings.resolve_output_dir(output_dir);

    info!(input = %input.display(), "reading snapshot");
    let document = fs::read_to_string(&input).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read {}: {e}", input.display()),
        hint: Some("pass the snapshot path: stratus run <input.json>".into()),
    })?;

    let store = CsvStore::new(&output_dir);
    let prior = load_prior(&store)?;

    let output = run_batch(&document, prior).map_err(snapshot_err)?;
    store.save(&output.relations()).map_err(store_write_err)?;

    let mut rows = BTreeMap::new();
    for (schema, relation) in output.relations() {
        eprintln!("{}: {} rows", schema.name, relation.len());
        rows.insert(schema.name, relation.len());
    }

    if json {
        let summary = RunSummary {
            input: input.display().to_string(),
            output_dir: output_dir.display().to_string(),
            rows,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                return Err(CliError {
                    code: exit_codes::EXIT_ERROR,
                    message: format!("JSON serialization error: {e}"),
                    hint: None,
                })
            }
        }
    }

    Ok(())
}

fn load_prior(store: &CsvStore) -> Result<PriorState, CliError> {
    Ok(PriorState {
        location: store.load(&schema::LOCATION).map_err(store_read_err)?,
        current_temp: store.load(&schema::CURRENT_TEMP).map_err(store_read_err)?,
        forecast_temp: store.load(&schema::FORECAST_TEMP).map_err(store_read_err)?,
        merged: store.load(&schema::MERGED).map_err(store_read_err)?,
        stats: store.load(&schema::STATS).map_err(store_read_err)?,
    })
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(input: &PathBuf) -> Result<(), CliError> {
    let document = fs::read_to_string(input).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read {}: {e}", input.display()),
        hint: None,
    })?;
    let records = snapshot::parse_document(&document).map_err(snapshot_err)?;
    eprintln!("{}: {} records OK", input.display(), records.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn cmd_show(
    settings: &Settings,
    relation: &str,
    limit: usize,
    output_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let schema = schema::by_name(relation).ok_or_else(|| CliError {
        code: EXIT_USAGE,
        message: format!("unknown relation '{relation}'"),
        hint: Some("relations: location, current_temp, forecast_temp, merged, stats".into()),
    })?;

    let output_dir = settings.resolve_output_dir(output_dir);
    let store = CsvStore::new(&output_dir);
    let loaded = store.load(schema).map_err(store_read_err)?;
    let loaded = loaded.ok_or_else(|| CliError {
        code: EXIT_STORE_READ,
        message: format!(
            "no persisted state for '{}' in {}",
            schema.name,
            output_dir.display()
        ),
        hint: Some("run `stratus run <input.json>` first".into()),
    })?;

    print!("{}", render_table(&loaded, limit));
    Ok(())
}

/// Aligned text rendering of the first `limit` rows.
fn render_table(relation: &Relation, limit: usize) -> String {
    let shown = relation.len().min(limit);

    let mut widths: Vec<usize> = relation.columns().iter().map(|c| c.len()).collect();
    let rendered: Vec<Vec<String>> = relation.rows()[..shown]
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = relation
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    if relation.len() > shown {
        out.push_str(&format!("({} of {} rows)\n", shown, relation.len()));
    }
    out
}
