//! Filesystem [`BlobStore`] for uploaded attachments.
//!
//! Layout under the configured root:
//! `user_<owner id>/<conversation id>/<unique prefix>_<sanitised filename>`.
//! The blob reference handed back to the store is that relative path, always
//! `/`-separated.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use bytes::Bytes;
use parley_core::blob::{BlobKey, BlobStore};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
  #[error("blob I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid blob reference: {0}")]
  InvalidRef(String),
}

#[derive(Debug, Clone)]
pub struct FsBlobStore {
  root: PathBuf,
}

impl FsBlobStore {
  /// Use `root` as the blob directory, creating it if needed.
  pub async fn new(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
    let root = root.into();
    fs::create_dir_all(&root).await?;
    info!(path = %root.display(), "blob store initialised");
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  fn owner_dir(&self, owner_id: Uuid) -> PathBuf { self.root.join(format!("user_{owner_id}")) }

  fn conversation_dir(&self, owner_id: Uuid, conversation_id: Uuid) -> PathBuf {
    self.owner_dir(owner_id).join(conversation_id.to_string())
  }

  /// Map a blob reference back to a path, refusing anything that could
  /// escape the root.
  fn resolve(&self, blob_ref: &str) -> Result<PathBuf, BlobError> {
    let mut path = self.root.clone();
    for segment in blob_ref.split('/') {
      if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return Err(BlobError::InvalidRef(blob_ref.to_owned()));
      }
      path.push(segment);
    }
    Ok(path)
  }
}

/// Reduce an uploaded filename to a safe single path component.
pub fn sanitize_file_name(file_name: &str) -> String {
  let base = file_name
    .rsplit(|c: char| c == '/' || c == '\\')
    .next()
    .unwrap_or(file_name);

  let cleaned: String = base
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
        c
      } else {
        '_'
      }
    })
    .collect();

  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() {
    "file".to_owned()
  } else {
    cleaned.to_owned()
  }
}

fn ignore_missing(result: std::io::Result<()>) -> Result<(), BlobError> {
  match result {
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    other => Ok(other?),
  }
}

impl BlobStore for FsBlobStore {
  type Error = BlobError;

  async fn put(&self, key: BlobKey, data: Bytes) -> Result<String, BlobError> {
    let dir = self.conversation_dir(key.owner_id, key.conversation_id);
    fs::create_dir_all(&dir).await?;

    let stored_name = format!(
      "{}_{}",
      Uuid::new_v4().simple(),
      sanitize_file_name(&key.file_name)
    );
    fs::write(dir.join(&stored_name), &data).await?;

    let blob_ref = format!(
      "user_{}/{}/{stored_name}",
      key.owner_id, key.conversation_id
    );
    debug!(blob = %blob_ref, size = data.len(), "stored blob");
    Ok(blob_ref)
  }

  async fn get(&self, blob_ref: String) -> Result<Option<Bytes>, BlobError> {
    let path = self.resolve(&blob_ref)?;
    match fs::read(&path).await {
      Ok(data) => Ok(Some(Bytes::from(data))),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn remove(&self, blob_ref: String) -> Result<(), BlobError> {
    let path = self.resolve(&blob_ref)?;
    ignore_missing(fs::remove_file(&path).await)?;
    debug!(blob = %blob_ref, "removed blob");
    Ok(())
  }

  async fn remove_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> Result<(), BlobError> {
    let dir = self.conversation_dir(owner_id, conversation_id);
    ignore_missing(fs::remove_dir_all(&dir).await)?;
    debug!(user = %owner_id, conversation = %conversation_id, "removed conversation blobs");
    Ok(())
  }

  async fn remove_owner(&self, owner_id: Uuid) -> Result<(), BlobError> {
    ignore_missing(fs::remove_dir_all(self.owner_dir(owner_id)).await)?;
    debug!(user = %owner_id, "removed owner blobs");
    Ok(())
  }
}
