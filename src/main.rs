mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use marktforge_core::config::{AppConfig, BrowserBackend};
use marktforge_storage::Storage;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    // Environment overrides; the remote browser endpoint and token are
    // secrets and normally arrive this way rather than via the config file.
    if let Ok(v) = std::env::var("DATABASE_URL") {
        config.database.postgres_url = v;
    }
    if let Ok(v) = std::env::var("BROWSER_WS_URL") {
        config.browser.remote_ws_url = Some(v);
        config.browser.backend = BrowserBackend::Remote;
    }
    if let Ok(v) = std::env::var("BROWSER_TOKEN") {
        config.browser.remote_token = Some(v);
    }
    if let Ok(v) = std::env::var("PAIR_LIMIT") {
        if let Ok(n) = v.parse::<i64>() {
            if n > 0 {
                config.automation.pair_limit = n;
            }
        }
    }

    let storage = Storage::new(&config.database.postgres_url, config.database.max_connections).await?;

    match cli.command {
        Commands::Migrate => {
            storage.run_migrations().await?;
        }
        Commands::Accounts { action } => {
            commands::accounts::run(&storage, &config, action).await?;
        }
        Commands::Proxies { action } => {
            commands::proxies::run(&storage, &config, action).await?;
        }
        Commands::Tasks { action } => {
            commands::tasks::run(&storage, action).await?;
        }
        Commands::Start { limit } => {
            commands::run::start(&storage, &config, limit).await?;
        }
        Commands::Process { count } => {
            commands::run::process(&storage, &config, count).await?;
        }
        Commands::Status => {
            commands::status::run(&storage).await?;
        }
        Commands::Settings { action } => {
            commands::settings::run(&storage, action).await?;
        }
    }

    Ok(())
}
