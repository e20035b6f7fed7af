mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Commands, GatewayCommands};
use wifiauth_core::config::default_wifiauth_dir;
use wifiauth_core::{Config, ConfigValidator, DomainError, GatewaySetting, WifiAuthError};
use wifiauth_gateway::{AppState, GatewayServer};
use wifiauth_store::{GatewaySettings, SqliteStore};

const DEFAULT_FILTER: &str = "wifiauth=info,wifiauth_gateway=info,warn";
const DEV_FILTER: &str =
    "wifiauth=debug,wifiauth_gateway=debug,wifiauth_channels=debug,wifiauth_store=debug,tower_http=debug,info";

fn init_tracing(dev: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if dev { DEV_FILTER } else { DEFAULT_FILTER })
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dev = matches!(cli.command, Commands::Serve { dev: true, .. });
    init_tracing(dev);

    match cli.command {
        Commands::Init => handle_init()?,
        Commands::ConfigSample { output } => {
            let path = output.unwrap_or_else(|| "./wifiauth.sample.yaml".into());
            Config::sample().save(&path)?;
            println!("Sample configuration written to {}", path.display());
        }
        Commands::Serve { host, port, dev } => {
            let mut config = load_config(&cli.config_path)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            ConfigValidator::validate(&config)?;
            handle_serve(config, dev).await?;
        }
        Commands::Gateway { command } => {
            let config = load_config(&cli.config_path)?;
            let store = SqliteStore::open(&config.storage.db_path)?;
            handle_gateway(&store, command).await?;
        }
    }

    Ok(())
}

/// Load the config file; without an explicit path, a missing file means defaults
fn load_config(path: &Option<String>) -> Result<Config> {
    let config = match Config::load(path) {
        Ok(config) => config,
        Err(WifiAuthError::Domain(DomainError::ConfigNotFound { .. })) if path.is_none() => {
            warn!("No configuration file found, using defaults");
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };
    ConfigValidator::validate(&config)?;
    Ok(config)
}

fn handle_init() -> Result<()> {
    let config_path = default_wifiauth_dir().join("config.yaml");

    if config_path.exists() {
        print!(
            "Configuration already exists at {}. Overwrite? [y/N] ",
            config_path.display()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    Config::default().save(&config_path)?;
    println!("Configuration written to {}", config_path.display());
    println!("Register gateways with `wifiauth gateway import <FILE>`");
    Ok(())
}

async fn handle_serve(config: Config, dev: bool) -> Result<()> {
    println!("wifiauth starting...");
    println!("  host: {}", config.server.host);
    println!("  port: {}", config.server.port);
    println!("  database: {}", config.storage.db_path.display());
    println!("  mode: {}", if dev { "development" } else { "production" });
    println!();

    let store = SqliteStore::open(&config.storage.db_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.storage.db_path.display()
        )
    })?;
    let gateways = store.list_gateway_ids().await?;
    info!("{} gateway(s) registered", gateways.len());
    if gateways.is_empty() {
        warn!("No gateway is registered; every login will be refused");
    }

    let state = AppState::new(config, Arc::new(store));
    GatewayServer::new(state).start().await
}

async fn handle_gateway(store: &SqliteStore, command: GatewayCommands) -> Result<()> {
    match command {
        GatewayCommands::Import { file } => {
            let setting = read_gateway_setting(&file)?;
            store.put_gateway_setting(&setting).await?;
            println!("Gateway {} imported", setting.gw_id);
        }
        GatewayCommands::Show { gw_id } => match store.gateway_setting(&gw_id).await? {
            Some(setting) => print!("{}", serde_yml::to_string(&setting)?),
            None => println!("Gateway {} is not registered", gw_id),
        },
    }
    Ok(())
}

fn read_gateway_setting(path: &Path) -> Result<GatewaySetting> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let setting: GatewaySetting = serde_yml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if setting.gw_id.trim().is_empty() {
        anyhow::bail!("{} has no gw_id", path.display());
    }
    Ok(setting)
}
