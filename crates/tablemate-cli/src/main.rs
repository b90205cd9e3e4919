//! Tablemate friend CLI
//!
//! Runs friend request and friendship commands as one user against the
//! file-backed friend store.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tablemate_cli::{output, run_command, CliConfig, CliError, Command};
use tablemate_social::{FileFriendStore, FriendService, UserDirectory};

#[derive(Parser)]
#[command(name = "tablemate")]
#[command(about = "Tablemate - friend requests and friendships", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Handle of the user running the command
    #[arg(long = "as", value_name = "HANDLE", global = true)]
    caller: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "tablemate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(&cli.config).await?;
    let directory = Arc::new(config.directory());

    let handle = cli
        .caller
        .ok_or_else(|| CliError::UnknownCaller("pass --as HANDLE".to_string()))?;
    let caller = directory
        .resolve(&handle)
        .await
        .map_err(|_| CliError::UnknownCaller(handle.clone()))?;

    let store = FileFriendStore::open(&config.social.data_path)
        .await
        .with_context(|| {
            format!(
                "failed to open friend store {}",
                config.social.data_path.display()
            )
        })?;
    let service = FriendService::new(Arc::new(store), directory.clone(), config.social.clone());

    let outcome = run_command(&service, directory.as_ref(), &caller, cli.command).await?;
    println!("{}", output::render(&outcome, cli.json)?);

    Ok(())
}
