//! gagstock: Messenger bot that tracks Grow a Garden shop stock.

use clap::{Parser, Subcommand};
use gagstock::config::{BotConfig, ConfigIssueSeverity, validate_config};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Messenger bot that tracks Grow a Garden stock per user.
#[derive(Parser)]
#[command(name = "gagstock", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the webhook and track stock (default).
    Run,

    /// Validate the configuration and exit.
    CheckConfig,

    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gagstock=info,gagstock_feed=info")),
        )
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(BotConfig::default_config_path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(load_config(&path)?).await,
        Command::CheckConfig => check_config(&load_config(&path)?),
        Command::InitConfig { force } => init_config(&path, force),
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<BotConfig> {
    let mut config = if path.exists() {
        info!("loading config from {}", path.display());
        BotConfig::from_file(path)?
    } else {
        info!("no config at {}; using defaults", path.display());
        BotConfig::default()
    };
    config.apply_env()?;
    Ok(config)
}

fn check_config(config: &BotConfig) -> anyhow::Result<()> {
    let issues = validate_config(config);
    if issues.is_empty() {
        println!("configuration OK");
        return Ok(());
    }
    for issue in &issues {
        let level = match issue.severity {
            ConfigIssueSeverity::Warning => "warning",
            ConfigIssueSeverity::Error => "error",
        };
        println!("{level}: [{}] {}", issue.id, issue.summary);
    }
    if issues
        .iter()
        .any(|issue| issue.severity == ConfigIssueSeverity::Error)
    {
        anyhow::bail!("configuration has blocking errors");
    }
    Ok(())
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    BotConfig::default().save_to_file(path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    info!("gagstock v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            ctrl_c.cancel();
        }
    });

    gagstock::channels::run_runtime(config, shutdown).await?;
    info!("gagstock shut down cleanly");
    Ok(())
}
