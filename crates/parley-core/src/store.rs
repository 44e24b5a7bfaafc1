//! The `ChatStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `parley-store-sqlite`).
//! Higher layers depend on this abstraction, not on any concrete backend.
//!
//! Every method that reaches a conversation, message or attachment takes the
//! acting owner's id and must filter by it inside the storage query. A record
//! owned by someone else is reported exactly like a missing one (`None` or
//! `false`), never fetched and then checked.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  attachment::{FileAttachment, NewAttachment},
  conversation::{Conversation, Message},
  user::{NewUser, User},
};

/// Abstraction over a Parley storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  /// Backends convert into [`crate::Error`] so that input they refuse stays a
  /// validation failure instead of becoming a storage one.
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new account. Returns `None` if the username is already taken.
  fn register_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Delete an account and, by cascade, everything it owns. Returns `false`
  /// if there was no such user.
  fn delete_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Refresh-token revocation ──────────────────────────────────────────

  fn revoke_token(
    &self,
    jti: Uuid,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn is_token_revoked(
    &self,
    jti: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Conversations ─────────────────────────────────────────────────────

  /// Create an empty conversation with a freshly generated identifier.
  fn create_conversation(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  fn find_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Option<Conversation>, Self::Error>> + Send + '_;

  /// All of the owner's conversations, newest first.
  fn list_conversations(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + '_;

  /// Delete a conversation together with its messages and attachment
  /// records. Returns `false` if the owner has no such conversation.
  fn delete_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Atomically record one prompt/response pair and bump the conversation's
  /// `last_edited_at`. Fails if `user_message` is empty.
  fn append_message(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
    user_message: String,
    ai_response: String,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Messages of one conversation, oldest first.
  fn list_messages(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Title derived from the first message, see [`crate::title`].
  fn derive_title(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  // ── Attachments ───────────────────────────────────────────────────────

  /// Record a stored blob against a message. Fails if the filename's
  /// extension is not accepted.
  fn attach_file(
    &self,
    owner_id: Uuid,
    message_id: Uuid,
    input: NewAttachment,
  ) -> impl Future<Output = Result<Option<FileAttachment>, Self::Error>> + Send + '_;

  /// Every attachment in a conversation, in upload order.
  fn list_attachments(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FileAttachment>, Self::Error>> + Send + '_;

  fn find_attachment(
    &self,
    owner_id: Uuid,
    attachment_id: Uuid,
  ) -> impl Future<Output = Result<Option<FileAttachment>, Self::Error>> + Send + '_;
}
