use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "certa",
    about = "Asset registration and certificate minting service",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
    /// Delete orphaned uploads recorded in a journal
    Sweep(SweepArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file; defaults apply without one
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Show this file merged over the defaults instead of the defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct SweepArgs {
    /// Upload-intent journal file
    #[arg(long)]
    pub journal: PathBuf,
    /// Root of the filesystem object store
    #[arg(long)]
    pub root: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Treat pending intents older than this as abandoned
    #[arg(long)]
    pub stale_after_secs: Option<u64>,
    /// Rewrite the journal without resolved intents afterwards
    #[arg(long)]
    pub compact: bool,
}
