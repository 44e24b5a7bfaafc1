//! Signed access and refresh tokens.
//!
//! Tokens use the compact JWS layout `header.claims.signature`, each segment
//! URL-safe base64 without padding, signed with HMAC-SHA256 over
//! `header.claims`.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use parley_core::user::Principal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Error)]
pub enum TokenError {
  #[error("malformed token")]
  Malformed,
  #[error("invalid signature")]
  BadSignature,
  #[error("token expired")]
  Expired,
  #[error("wrong token kind")]
  WrongKind,
  #[error("invalid signing key")]
  InvalidKey,
  #[error("claims encoding failed: {0}")]
  Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
  Access,
  Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub sub:      Uuid,
  pub username: String,
  pub kind:     TokenKind,
  /// Seconds since the Unix epoch.
  pub iat:      i64,
  pub exp:      i64,
  pub jti:      Uuid,
}

impl Claims {
  pub fn principal(&self) -> Principal {
    Principal {
      user_id:  self.sub,
      username: self.username.clone(),
    }
  }

  pub fn expires_at(&self) -> DateTime<Utc> {
    DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
  }
}

/// Issues and verifies tokens with a single shared secret.
pub struct TokenIssuer {
  secret:      Vec<u8>,
  access_ttl:  Duration,
  refresh_ttl: Duration,
}

impl TokenIssuer {
  pub fn new(secret: impl Into<Vec<u8>>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
    Self {
      secret: secret.into(),
      access_ttl,
      refresh_ttl,
    }
  }

  pub fn ttl(&self, kind: TokenKind) -> Duration {
    match kind {
      TokenKind::Access => self.access_ttl,
      TokenKind::Refresh => self.refresh_ttl,
    }
  }

  pub fn issue(&self, principal: &Principal, kind: TokenKind) -> Result<String, TokenError> {
    self.issue_at(principal, kind, Utc::now())
  }

  pub fn issue_at(
    &self,
    principal: &Principal,
    kind: TokenKind,
    now: DateTime<Utc>,
  ) -> Result<String, TokenError> {
    let claims = Claims {
      sub:      principal.user_id,
      username: principal.username.clone(),
      kind,
      iat:      now.timestamp(),
      exp:      (now + self.ttl(kind)).timestamp(),
      jti:      Uuid::new_v4(),
    };

    let header = B64.encode(HEADER);
    let payload = B64.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = B64.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
  }

  pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
    self.verify_at(token, kind, Utc::now())
  }

  /// Check signature, kind and expiry, in that order.
  pub fn verify_at(
    &self,
    token: &str,
    kind: TokenKind,
    now: DateTime<Utc>,
  ) -> Result<Claims, TokenError> {
    let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;

    let header = B64.decode(header).map_err(|_| TokenError::Malformed)?;
    if header != HEADER.as_bytes() {
      return Err(TokenError::Malformed);
    }

    let signature = B64.decode(signature).map_err(|_| TokenError::Malformed)?;
    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    mac
      .verify_slice(&signature)
      .map_err(|_| TokenError::BadSignature)?;

    let payload = B64.decode(payload).map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

    if claims.kind != kind {
      return Err(TokenError::WrongKind);
    }
    if claims.exp <= now.timestamp() {
      return Err(TokenError::Expired);
    }
    Ok(claims)
  }

  fn mac(&self) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)
  }
}
