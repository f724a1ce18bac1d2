//! Backup engine CLI: runs one backup/restore/scrub/cleanup/retention
//! operation per invocation against the configured metadata store and
//! object storage, then exits.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_engine::{build_engine, parse_hints, Args, Command, EngineConfig, Error};

fn parse_version_id(s: &str) -> Result<u64, Error> {
    s.trim_start_matches('V')
        .parse()
        .map_err(|e| Error::Usage(format!("invalid version id '{s}': {e}")))
}

async fn run(args: Args) -> Result<(), Error> {
    let config = EngineConfig::load(&args.config)?;
    tracing::info!(
        metadata_path = %config.metadata_path.display(),
        block_size = config.block_size,
        "configuration loaded"
    );
    let engine = build_engine(config)?;

    match args.command {
        Command::Backup { volume, snapshot, source, base_version, hints } => {
            let base_version = base_version.map(|v| parse_version_id(&v)).transpose()?;
            let hints = hints.map(|h| parse_hints(&h)).transpose()?;
            let id = engine.backup(&volume, &snapshot, &source, base_version, hints).await?;
            tracing::info!(version_id = id, "backup complete");
            println!("{id}");
        }
        Command::Restore { version, target, force, sparse } => {
            let version_id = parse_version_id(&version)?;
            engine.restore(version_id, &target, force, sparse).await?;
            tracing::info!(version_id, "restore complete");
        }
        Command::Scrub { version, block_percentage } => {
            let version_id = parse_version_id(&version)?;
            let report = engine.scrub(version_id, block_percentage).await?;
            tracing::info!(checked = report.checked, invalid = report.invalid, "scrub complete");
        }
        Command::DeepScrub { version, source, block_percentage } => {
            let version_id = parse_version_id(&version)?;
            let report = engine.deep_scrub(version_id, source.as_deref(), block_percentage).await?;
            tracing::info!(checked = report.checked, invalid = report.invalid, "deep-scrub complete");
        }
        Command::Cleanup { override_lock } => {
            let removed = engine.cleanup(override_lock).await?;
            tracing::info!(removed, "cleanup complete");
        }
        Command::EnforceRetention { rules, filter, group_label } => {
            let dismissed =
                engine.enforce_retention(&rules, filter.as_deref(), group_label.as_deref()).await?;
            tracing::info!(dismissed = dismissed.len(), "retention enforced");
            for id in dismissed {
                println!("{id}");
            }
        }
        Command::ExportMetadata { version } => {
            let version_id = parse_version_id(&version)?;
            engine.export_version(version_id).await?;
            tracing::info!(version_id, "metadata exported");
        }
        Command::ImportMetadata { path } => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| Error::Usage(format!("reading {}: {e}", path.display())))?;
            let ids = engine.import_metadata(&json)?;
            tracing::info!(imported = ids.len(), "metadata imported");
            for id in ids {
                println!("{id}");
            }
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
                .unwrap_or_else(|_| "strata_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "operation failed");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
