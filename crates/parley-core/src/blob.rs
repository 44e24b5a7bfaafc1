//! The blob storage seam for uploaded file contents.
//!
//! Blobs are grouped by owner, then by conversation, so a whole conversation
//! or a whole account can be cleaned up without enumerating its files.

use std::future::Future;

use bytes::Bytes;
use uuid::Uuid;

/// Where a new blob belongs.
#[derive(Debug, Clone)]
pub struct BlobKey {
  pub owner_id:        Uuid,
  pub conversation_id: Uuid,
  /// Original filename; implementations sanitise and de-duplicate it.
  pub file_name:       String,
}

pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `data` and return an opaque reference to it. The write is
  /// complete when the future resolves.
  fn put(
    &self,
    key: BlobKey,
    data: Bytes,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Read a blob back. Returns `None` if it no longer exists.
  fn get(
    &self,
    blob_ref: String,
  ) -> impl Future<Output = Result<Option<Bytes>, Self::Error>> + Send + '_;

  /// Delete a single blob. Missing blobs are not an error.
  fn remove(
    &self,
    blob_ref: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every blob stored for one conversation.
  fn remove_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every blob stored for one owner.
  fn remove_owner(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
