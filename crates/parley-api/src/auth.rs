//! Password hashing, the bearer-token extractor and the refresh cookie.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use parley_core::{gateway::CompletionGateway, store::ChatStore, user::Principal};
use rand_core::OsRng;
use tower_cookies::{
  Cookie, Cookies,
  cookie::{SameSite, time::Duration},
};

use crate::{AppState, error::ApiError, token::TokenKind};

/// Name of the http-only cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

// ─── Passwords ────────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// `true` if `password` matches the PHC string `hash`. An unparsable hash
/// never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

// ─── Extractor ────────────────────────────────────────────────────────────────

/// The authenticated caller. Present in a handler means the request carried a
/// valid, unexpired access token for a user that still exists.
pub struct CurrentUser(pub Principal);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

impl<S, G> FromRequestParts<AppState<S, G>> for CurrentUser
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, G>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    let claims = state.tokens.verify(token, TokenKind::Access)?;

    let user = state
      .store
      .get_user(claims.sub)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;

    Ok(CurrentUser(Principal::from(&user)))
  }
}

// ─── Refresh cookie ───────────────────────────────────────────────────────────

fn base_refresh_cookie(token: String, secure: bool) -> Cookie<'static> {
  Cookie::build((REFRESH_COOKIE, token))
    .http_only(true)
    .same_site(SameSite::Lax)
    .path("/")
    .secure(secure)
    .build()
}

/// Hand `token` to the client as the http-only refresh cookie.
pub fn set_refresh_cookie(cookies: &Cookies, token: String, max_age_secs: u64, secure: bool) {
  let mut cookie = base_refresh_cookie(token, secure);
  cookie.set_max_age(Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)));
  cookies.add(cookie);
}

/// Tell the client to drop the refresh cookie, whether or not it sent one.
pub fn clear_refresh_cookie(cookies: &Cookies, secure: bool) {
  let mut cookie = base_refresh_cookie(String::new(), secure);
  cookie.make_removal();
  cookies.add(cookie);
}

/// The refresh token carried by the request's cookies, if any.
pub fn refresh_cookie_value(cookies: &Cookies) -> Option<String> {
  cookies
    .get(REFRESH_COOKIE)
    .map(|c| c.value().to_owned())
    .filter(|value| !value.is_empty())
}
