//! JSON HTTP API for Parley.
//!
//! Exposes an axum [`Router`] backed by any [`ChatStore`] and
//! [`CompletionGateway`]. Every route except registration, login and token
//! refresh requires a bearer access token; see [`auth::CurrentUser`].

pub mod auth;
pub mod blobs;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod token;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use chrono::Duration;
use parley_core::{chat::ChatService, gateway::CompletionGateway, store::ChatStore};
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use blobs::FsBlobStore;
use handlers::{account, attachments, chat, history};
use token::TokenIssuer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PARLEY_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  #[serde(default = "default_blob_dir")]
  pub blob_dir:               PathBuf,
  /// HMAC key for access and refresh tokens.
  pub token_secret:           String,
  #[serde(default = "default_access_ttl")]
  pub access_token_ttl_secs:  u64,
  #[serde(default = "default_refresh_ttl")]
  pub refresh_token_ttl_secs: u64,
  /// Mark the refresh cookie `Secure`. Enable behind TLS.
  #[serde(default)]
  pub secure_cookies:         bool,
  #[serde(default = "default_max_upload")]
  pub max_upload_bytes:       usize,
  pub completion:             CompletionConfig,
}

/// Settings for the OpenAI-compatible completion service.
#[derive(Deserialize, Clone)]
pub struct CompletionConfig {
  #[serde(default = "default_base_url")]
  pub base_url:      String,
  pub api_key:       String,
  #[serde(default = "default_model")]
  pub model:         String,
  #[serde(default = "default_timeout")]
  pub timeout_secs:  u64,
  #[serde(default)]
  pub system_prompt: Option<String>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("parley.db") }
fn default_blob_dir() -> PathBuf { PathBuf::from("media") }
fn default_access_ttl() -> u64 { 300 }
fn default_refresh_ttl() -> u64 { 86_400 }
fn default_max_upload() -> usize { 50 * 1024 * 1024 }
fn default_base_url() -> String { "https://api.openai.com/v1".to_owned() }
fn default_model() -> String { "gpt-4o-mini".to_owned() }
fn default_timeout() -> u64 { 60 }

/// Token lifetimes are clamped to ten years.
fn secs(n: u64) -> Duration {
  const TEN_YEARS: u64 = 10 * 365 * 86_400;
  Duration::seconds(n.min(TEN_YEARS) as i64)
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, G> {
  pub chat:   Arc<ChatService<S, G, FsBlobStore>>,
  pub store:  Arc<S>,
  pub tokens: Arc<TokenIssuer>,
  pub config: Arc<ServerConfig>,
}

impl<S, G> Clone for AppState<S, G> {
  fn clone(&self) -> Self {
    Self {
      chat:   Arc::clone(&self.chat),
      store:  Arc::clone(&self.store),
      tokens: Arc::clone(&self.tokens),
      config: Arc::clone(&self.config),
    }
  }
}

impl<S, G> AppState<S, G>
where
  S: ChatStore,
  G: CompletionGateway,
{
  pub fn new(store: Arc<S>, gateway: G, blobs: FsBlobStore, config: ServerConfig) -> Self {
    let tokens = TokenIssuer::new(
      config.token_secret.as_bytes(),
      secs(config.access_token_ttl_secs),
      secs(config.refresh_token_ttl_secs),
    );
    let chat = ChatService::new(Arc::clone(&store), Arc::new(gateway), Arc::new(blobs));

    Self {
      chat: Arc::new(chat),
      store,
      tokens: Arc::new(tokens),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the Parley API router.
pub fn router<S, G>(state: AppState<S, G>) -> Router
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let body_limit = state.config.max_upload_bytes;

  Router::new()
    // Accounts
    .route("/register/", post(account::register::<S, G>))
    .route("/login/", post(account::login::<S, G>))
    .route("/refresh/", post(account::refresh::<S, G>))
    .route("/logout/", post(account::logout::<S, G>))
    .route(
      "/profile/",
      get(account::profile::<S, G>).delete(account::delete_profile::<S, G>),
    )
    // Conversations
    .route("/conversations/", post(chat::start::<S, G>))
    .route("/chat/", post(chat::submit::<S, G>))
    .route("/history/", get(history::list::<S, G>))
    .route(
      "/history/{id}/",
      get(history::get_one::<S, G>).delete(history::delete_one::<S, G>),
    )
    // Attachments
    .route("/attachments/{id}/", get(attachments::download::<S, G>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(CookieManagerLayer::new())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
