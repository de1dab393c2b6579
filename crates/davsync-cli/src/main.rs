//! davsync CLI - Command-line interface for davsync
//!
//! Provides commands for:
//! - Running a sync cycle on demand
//! - Checking the server and local root
//! - Listing and deleting entries on either store
//! - Viewing and creating the configuration
//! - Inspecting exclusion rules

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use davsync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    check::CheckCommand, config::ConfigCommand, exclusions::ExclusionsCommand, ls::LsCommand,
    rm::RmCommand, sync::SyncCommand, CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "davsync", version, about = "Mirror a WebDAV folder and a local directory")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize now (pull, then push)
    Sync(SyncCommand),
    /// Test the server connection and the local root
    Check(CheckCommand),
    /// List a directory
    Ls(LsCommand),
    /// Delete a file or directory from one store
    Rm(RmCommand),
    /// View and create configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect exclusion rules
    #[command(subcommand)]
    Exclusions(ExclusionsCommand),
}

/// Level from the configuration, raised by each `-v`
fn log_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = CliContext {
        config_path: cli.config.clone().unwrap_or_else(Config::default_path),
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
    };

    // Logs go to stderr so `--json` output stays parseable.
    let configured = ctx
        .load_config()
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = log_level(&configured, cli.verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Check(cmd) => cmd.execute(&ctx).await,
        Commands::Ls(cmd) => cmd.execute(&ctx).await,
        Commands::Rm(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Exclusions(cmd) => cmd.execute(&ctx).await,
    }
}
