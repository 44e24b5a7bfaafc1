//! Account handlers: registration, login, token refresh, logout and profile.
//!
//! | Method   | Path         | Notes |
//! |----------|--------------|-------|
//! | `POST`   | `/register/` | Body: `{"username","email","password"}` |
//! | `POST`   | `/login/`    | Sets the `refresh_token` cookie |
//! | `POST`   | `/refresh/`  | Refresh token from the cookie or `{"refresh_token"}` |
//! | `POST`   | `/logout/`   | Revokes the refresh token, clears the cookie |
//! | `GET`    | `/profile/`  | |
//! | `DELETE` | `/profile/`  | Deletes the account and everything it owns |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use parley_core::{gateway::CompletionGateway, store::ChatStore, user::{NewUser, Principal}};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;
use tracing::{debug, info};

use crate::{
  AppState,
  auth::{self, CurrentUser},
  error::ApiError,
  handlers::parse_json,
  token::TokenKind,
};

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RegisterBody {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub email:    String,
  #[serde(default)]
  pub password: String,
}

/// `POST /register/`
pub async fn register<S, G>(
  State(state): State<AppState<S, G>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let body: RegisterBody = parse_json(&body)?;
  let username = body.username.trim().to_owned();
  let email = body.email.trim().to_owned();

  let missing: Vec<&str> = [
    ("username", username.is_empty()),
    ("email", email.is_empty()),
    ("password", body.password.is_empty()),
  ]
  .into_iter()
  .filter_map(|(field, empty)| empty.then_some(field))
  .collect();
  if !missing.is_empty() {
    return Err(ApiError::BadRequest(format!(
      "missing required fields: {}",
      missing.join(", ")
    )));
  }

  let password_hash = auth::hash_password(&body.password)?;
  let user = state
    .store
    .register_user(NewUser { username, email, password_hash })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::BadRequest("username already taken".to_owned()))?;

  info!(user = %user.user_id, username = %user.username, "registered user");
  Ok((
    StatusCode::CREATED,
    Json(json!({ "message": "user registered successfully" })),
  ))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,
}

/// `POST /login/`
pub async fn login<S, G>(
  State(state): State<AppState<S, G>>,
  cookies: Cookies,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let body: LoginBody = parse_json(&body)?;

  let user = state
    .store
    .find_user_by_username(body.username.trim().to_owned())
    .await
    .map_err(ApiError::store)?
    .filter(|user| auth::verify_password(&body.password, &user.password_hash))
    .ok_or_else(|| {
      debug!(username = %body.username, "login failed");
      ApiError::Unauthorized
    })?;

  let principal = Principal::from(&user);
  let access_token = state.tokens.issue(&principal, TokenKind::Access)?;
  let refresh_token = state.tokens.issue(&principal, TokenKind::Refresh)?;
  auth::set_refresh_cookie(
    &cookies,
    refresh_token.clone(),
    state.config.refresh_token_ttl_secs,
    state.config.secure_cookies,
  );

  info!(user = %user.user_id, "logged in");
  Ok(Json(json!({
    "access_token": access_token,
    "refresh_token": refresh_token,
    "username": user.username,
  })))
}

// ─── Refresh ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RefreshBody {
  pub refresh_token: Option<String>,
}

/// The refresh token presented with a request: the cookie wins over the body.
fn presented_refresh_token(cookies: &Cookies, body: &Bytes) -> Result<Option<String>, ApiError> {
  if let Some(token) = auth::refresh_cookie_value(cookies) {
    return Ok(Some(token));
  }
  let body: RefreshBody = parse_json(body)?;
  Ok(body.refresh_token.filter(|t| !t.is_empty()))
}

/// `POST /refresh/`
pub async fn refresh<S, G>(
  State(state): State<AppState<S, G>>,
  cookies: Cookies,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let token = presented_refresh_token(&cookies, &body)?.ok_or(ApiError::Unauthorized)?;
  let claims = state.tokens.verify(&token, TokenKind::Refresh)?;

  let revoked = state
    .store
    .is_token_revoked(claims.jti)
    .await
    .map_err(ApiError::store)?;
  if revoked {
    debug!(jti = %claims.jti, "revoked refresh token presented");
    return Err(ApiError::Unauthorized);
  }

  let user = state
    .store
    .get_user(claims.sub)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  let access_token = state.tokens.issue(&Principal::from(&user), TokenKind::Access)?;
  Ok(Json(json!({ "access_token": access_token })))
}

// ─── Logout ───────────────────────────────────────────────────────────────────

/// `POST /logout/`
pub async fn logout<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  cookies: Cookies,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  // A missing or already-invalid refresh token still logs out.
  if let Some(token) = presented_refresh_token(&cookies, &body)?
    && let Ok(claims) = state.tokens.verify(&token, TokenKind::Refresh)
    && claims.sub == principal.user_id
  {
    state
      .store
      .revoke_token(claims.jti, claims.expires_at())
      .await
      .map_err(ApiError::store)?;
    debug!(jti = %claims.jti, "revoked refresh token");
  }

  auth::clear_refresh_cookie(&cookies, state.config.secure_cookies);
  info!(user = %principal.user_id, "logged out");
  Ok(Json(json!({ "message": "logged out" })))
}

// ─── Profile ──────────────────────────────────────────────────────────────────

/// `GET /profile/`
pub async fn profile<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let user = state
    .store
    .get_user(principal.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  Ok(Json(json!({
    "username": user.username,
    "email": user.email,
    "date_joined": user.created_at,
  })))
}

/// `DELETE /profile/`
pub async fn delete_profile<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  cookies: Cookies,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  state.chat.delete_account(&principal).await?;

  auth::clear_refresh_cookie(&cookies, state.config.secure_cookies);
  Ok(Json(json!({ "message": "account deleted" })))
}
