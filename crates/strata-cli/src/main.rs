//! `strata` — thin CLI wrapper over the backup engine's operations,
//! exposing backup/restore/scrub/deep-scrub/cleanup/enforce-retention/ls
//! as one-shot subcommands with table or JSON output.

mod commands;
mod formatter;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::Cli;
use formatter::OutputFormat;
use strata_engine::{build_engine, parse_hints, EngineConfig, Error};

#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about = "Deduplicating block-level backup engine CLI", long_about = None)]
struct Args {
    /// Path to the engine configuration file (YAML).
    #[arg(short, long)]
    config: PathBuf,

    /// Output format for anything this command prints.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Cli,
}

fn parse_version_id(s: &str) -> Result<u64, Error> {
    s.trim_start_matches('V')
        .parse()
        .map_err(|e| Error::Usage(format!("invalid version id '{s}': {e}")))
}

async fn run(args: Args) -> Result<(), Error> {
    let config = EngineConfig::load(&args.config)?;
    let engine = build_engine(config)?;
    let format = args.format;

    match args.command {
        Cli::Backup { volume, snapshot, source, base_version, hints } => {
            let base_version = base_version.map(|v| parse_version_id(&v)).transpose()?;
            let hints = hints.map(|h| parse_hints(&h)).transpose()?;
            let id = engine.backup(&volume, &snapshot, &source, base_version, hints).await?;
            formatter::print_ids("version_id", &[id], format);
        }
        Cli::Restore { version, target, force, sparse } => {
            let version_id = parse_version_id(&version)?;
            engine.restore(version_id, &target, force, sparse).await?;
        }
        Cli::Scrub { version, block_percentage } => {
            let version_id = parse_version_id(&version)?;
            let report = engine.scrub(version_id, block_percentage).await?;
            formatter::print_scrub_report(&report, format);
        }
        Cli::DeepScrub { version, source, block_percentage } => {
            let version_id = parse_version_id(&version)?;
            let report = engine.deep_scrub(version_id, source.as_deref(), block_percentage).await?;
            formatter::print_scrub_report(&report, format);
        }
        Cli::Cleanup { override_lock } => {
            let removed = engine.cleanup(override_lock).await?;
            formatter::print_ids("removed", &[removed as u64], format);
        }
        Cli::EnforceRetention { rules, filter, group_label } => {
            let dismissed =
                engine.enforce_retention(&rules, filter.as_deref(), group_label.as_deref()).await?;
            formatter::print_ids("dismissed", &dismissed, format);
        }
        Cli::Ls { filter } => {
            let versions = engine.list_versions(filter.as_deref())?;
            formatter::print_versions(&versions, format);
        }
        Cli::ExportMetadata { version } => {
            let version_id = parse_version_id(&version)?;
            engine.export_version(version_id).await?;
        }
        Cli::ImportMetadata { path } => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| Error::Usage(format!("reading {}: {e}", path.display())))?;
            let ids = engine.import_metadata(&json)?;
            formatter::print_ids("imported", &ids, format);
        }
    }
    engine.close();
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata_cli=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
