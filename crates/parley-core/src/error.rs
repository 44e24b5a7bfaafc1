//! Error types for `parley-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no message provided")]
  EmptyTurn,

  #[error("user message must not be empty")]
  EmptyUserMessage,

  #[error("unsupported file type: {0}")]
  UnsupportedFileType(String),

  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("attachment not found: {0}")]
  AttachmentNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("completion service error: {0}")]
  Upstream(#[from] GatewayError),

  #[error("blob storage error: {0}")]
  Blob(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], used by outer layers to pick a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed or missing input.
  Validation,
  /// Absent, or owned by someone else. The two are never distinguished.
  NotFound,
  /// The completion service failed.
  Upstream,
  /// Persistence or blob storage failed.
  Storage,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::EmptyTurn | Self::EmptyUserMessage | Self::UnsupportedFileType(_) => {
        ErrorKind::Validation
      }
      Self::ConversationNotFound(_)
      | Self::MessageNotFound(_)
      | Self::AttachmentNotFound(_)
      | Self::UserNotFound(_) => ErrorKind::NotFound,
      Self::Upstream(_) => ErrorKind::Upstream,
      Self::Blob(_) | Self::Store(_) => ErrorKind::Storage,
    }
  }

  /// Lift a [`ChatStore`](crate::store::ChatStore) error, keeping its kind.
  pub(crate) fn store<E: Into<Self>>(e: E) -> Self { e.into() }

  /// Wrap any backend failure as a storage error.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn blob<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Blob(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
