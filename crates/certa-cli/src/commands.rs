use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use certa_journal::{FileJournal, OrphanSweeper, SweepReport};
use certa_server::{CertaConfig, CertaServer};
use certa_store::{FsObjectStore, StorageBackend};
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
        Command::Sweep(args) => {
            let report = cmd_sweep(&args)?;
            print_report(&report, &args, cli.format)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CertaConfig> {
    match path {
        Some(path) => CertaConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(CertaConfig::default()),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("starting tokio runtime")
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    println!(
        "{} certa on {} (storage: {:?}, chain {})",
        "▶".green().bold(),
        config.server.bind_addr.to_string().bold(),
        config.storage.backend,
        config.chain.chain_id.to_string().cyan(),
    );
    runtime()?.block_on(CertaServer::new(config).serve())?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// One pass over a file journal. Item rows live in the server process, so
/// an offline pass resolves orphaned intents only and leaves pending ones.
fn cmd_sweep(args: &SweepArgs) -> anyhow::Result<SweepReport> {
    let mut config = load_config(args.config.as_deref())?;
    config.storage.backend = StorageBackend::Filesystem;
    config.storage.root = args.root.clone();
    if let Some(secs) = args.stale_after_secs {
        config.sweeper.stale_after_secs = secs;
    }

    let journal = Arc::new(
        FileJournal::open(&args.journal)
            .with_context(|| format!("opening journal {}", args.journal.display()))?,
    );
    let report = runtime()?.block_on(async {
        let store = FsObjectStore::open(config.storage.clone()).await?;
        let sweeper = OrphanSweeper::new(journal.clone(), Arc::new(store), config.sweeper.clone());
        anyhow::Ok(sweeper.sweep_once().await?)
    })?;

    if args.compact {
        let kept = journal.compact()?;
        tracing::info!(kept, "journal compacted");
    }
    Ok(report)
}

fn print_report(report: &SweepReport, args: &SweepArgs, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let mark = if report.failed == 0 { "✓".green().bold() } else { "!".yellow().bold() };
            println!("{mark} Swept {}", args.journal.display().to_string().bold());
            println!("  Examined: {}", report.examined);
            println!("  Deleted:  {}", report.deleted.to_string().green());
            if report.failed > 0 {
                println!("  Failed:   {} (left for the next pass)", report.failed.to_string().red());
            }
        }
    }
    Ok(())
}
