use std::{net::SocketAddr, path::Path, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use banking_api::{build_router, AppState};
use banking_storage::{BankingStorage, StorageConfig};
use banking_transfer::{HealthCheck, InMemoryTransferStore, TransferStore, TransferUseCase};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Banking transfer service daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve {
        #[arg(long, default_value = "config/node.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RuntimeConfig {
    http: HttpSection,
    storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
struct HttpSection {
    bind: String,
    auth_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    #[serde(default)]
    backend: StorageBackend,
    sqlite_path: Option<String>,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_connections() -> u32 {
    5
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => serve(config).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config_source = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config file {}", config_path.display()))?;
    let config: RuntimeConfig = toml::from_str(&config_source)
        .with_context(|| format!("invalid config TOML at {}", config_path.display()))?;

    let require_bearer = requires_token(&config.http.bind);
    if require_bearer && config.http.auth_token.is_none() {
        return Err(anyhow!(
            "non-loopback bind {} requires http.auth_token",
            config.http.bind
        ));
    }

    if !require_bearer {
        info!("loopback bind detected: bearer auth optional");
    } else {
        warn!("non-loopback bind detected: bearer auth enforced");
    }

    let request_timeout = request_timeout(&config.http)?;
    let (store, health) = open_store(&config.storage).await?;
    let state = AppState::new(
        TransferUseCase::new(store),
        health,
        config.http.auth_token.clone(),
        require_bearer,
        request_timeout,
    );
    let app = build_router(state);

    let socket: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid socket address {}", config.http.bind))?;

    let listener = tokio::net::TcpListener::bind(socket)
        .await
        .with_context(|| format!("failed to bind {}", config.http.bind))?;

    info!(bind = %config.http.bind, "bankingd listening");
    axum::serve(listener, app).await.context("axum server failed")
}

type StoreHandles = (Arc<dyn TransferStore>, Arc<dyn HealthCheck>);

async fn open_store(section: &StorageSection) -> Result<StoreHandles> {
    match section.backend {
        StorageBackend::Memory => {
            warn!("in-memory transfer store selected: transfers are lost on exit");
            let store = Arc::new(InMemoryTransferStore::new());
            let health: Arc<dyn HealthCheck> = store.clone();
            let store: Arc<dyn TransferStore> = store;
            Ok((store, health))
        }
        StorageBackend::Sqlite => {
            let sqlite_path = section
                .sqlite_path
                .clone()
                .context("storage.sqlite_path is required for the sqlite backend")?;
            ensure_parent_dir(&sqlite_path)?;
            let storage = BankingStorage::connect(&StorageConfig {
                sqlite_path,
                max_connections: section.max_connections,
            })
            .await?;
            let health: Arc<dyn HealthCheck> = Arc::new(storage.clone());
            let store: Arc<dyn TransferStore> = Arc::new(storage);
            Ok((store, health))
        }
    }
}

fn request_timeout(http: &HttpSection) -> Result<Duration> {
    if http.request_timeout_ms == 0 {
        return Err(anyhow!("http.request_timeout_ms must be greater than zero"));
    }
    Ok(Duration::from_millis(http.request_timeout_ms))
}

fn ensure_parent_dir(sqlite_path: &str) -> Result<()> {
    if sqlite_path.starts_with("sqlite:") {
        return Ok(());
    }
    match Path::new(sqlite_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display())),
        _ => Ok(()),
    }
}

fn requires_token(bind: &str) -> bool {
    match bind.parse::<SocketAddr>() {
        Ok(addr) => !addr.ip().is_loopback(),
        Err(_) => true,
    }
}
