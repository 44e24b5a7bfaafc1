//! Users and the authenticated principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. The credential hash never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
  pub user_id:       Uuid,
  pub username:      String,
  pub email:         String,
  /// PHC string produced by the password hasher, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Input for [`ChatStore::register_user`](crate::store::ChatStore::register_user).
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  pub password_hash: String,
}

/// The verified identity making a request.
///
/// Every repository access is scoped by `user_id`; there is no way to reach a
/// conversation without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub user_id:  Uuid,
  pub username: String,
}

impl From<&User> for Principal {
  fn from(user: &User) -> Self {
    Self {
      user_id:  user.user_id,
      username: user.username.clone(),
    }
  }
}
