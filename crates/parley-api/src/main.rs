//! parley server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `PARLEY_*` environment variables, opens the SQLite store and blob
//! directory, and serves the JSON API over HTTP.
//!
//! Nested keys use `__` in the environment, e.g.
//! `PARLEY_COMPLETION__API_KEY=sk-...`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use parley_api::{AppState, ServerConfig, blobs::FsBlobStore, gateway::OpenAiGateway};
use parley_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Parley chat API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PARLEY")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read configuration")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.blob_dir = expand_tilde(&server_cfg.blob_dir);

  if server_cfg.token_secret.len() < 32 {
    tracing::warn!("token_secret is shorter than 32 bytes");
  }

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let blobs = FsBlobStore::new(&server_cfg.blob_dir)
    .await
    .with_context(|| format!("failed to prepare blob directory {:?}", server_cfg.blob_dir))?;

  let gateway = OpenAiGateway::new(&server_cfg.completion)
    .context("failed to configure completion gateway")?;

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(Arc::new(store), gateway, blobs, server_cfg);
  let app = parley_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
