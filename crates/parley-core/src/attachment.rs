//! File attachments and their extension-based classification.
//!
//! The category of a file is never stored. It is recomputed from the
//! filename on every read so it cannot drift from [`CATEGORY_TABLE`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Classification ──────────────────────────────────────────────────────────

/// Broad kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileCategory {
  Image,
  Document,
  Archive,
  Audio,
  Video,
  Other,
}

/// Extension → category lookup. Extensions are lower-case with the dot.
pub const CATEGORY_TABLE: &[(FileCategory, &[&str])] = &[
  (FileCategory::Image, &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg",
  ]),
  (FileCategory::Document, &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".rtf",
  ]),
  (FileCategory::Archive, &[".zip", ".rar", ".7z", ".tar", ".gz"]),
  (FileCategory::Audio, &[".mp3", ".wav", ".ogg", ".flac"]),
  (FileCategory::Video, &[".mp4", ".mov", ".avi", ".mkv", ".wmv"]),
];

/// Extensions accepted at upload time.
///
/// Currently every entry also appears in [`CATEGORY_TABLE`], which leaves
/// [`FileCategory::Other`] unreachable for stored files.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
  ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".pdf",
  ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".rtf", ".zip",
  ".rar", ".7z", ".tar", ".gz", ".mp3", ".wav", ".ogg", ".flac", ".mp4", ".mov",
  ".avi", ".mkv", ".wmv",
];

/// Lower-cased extension of `file_name`, including the leading dot.
///
/// Returns an empty string when there is no extension. Leading dots of the
/// final path component (`.bashrc`) do not start an extension.
pub fn file_extension(file_name: &str) -> String {
  let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
  let stem_start = base.len() - base.trim_start_matches('.').len();
  match base[stem_start..].rfind('.') {
    Some(idx) => base[stem_start + idx..].to_lowercase(),
    None => String::new(),
  }
}

/// Map an extension (as returned by [`file_extension`]) to its category.
pub fn categorize(extension: &str) -> FileCategory {
  CATEGORY_TABLE
    .iter()
    .find(|(_, exts)| exts.contains(&extension))
    .map(|(category, _)| *category)
    .unwrap_or(FileCategory::Other)
}

pub fn is_accepted(file_name: &str) -> bool {
  ACCEPTED_EXTENSIONS.contains(&file_extension(file_name).as_str())
}

/// Reject filenames whose extension is not in [`ACCEPTED_EXTENSIONS`].
pub fn validate_file_name(file_name: &str) -> Result<()> {
  if is_accepted(file_name) {
    Ok(())
  } else {
    Err(Error::UnsupportedFileType(file_name.to_owned()))
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Metadata for a file uploaded alongside a message. The bytes live in blob
/// storage under `blob_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
  pub attachment_id: Uuid,
  pub message_id:    Uuid,
  pub blob_ref:      String,
  /// Original filename as uploaded.
  pub file_name:     String,
  /// Declared MIME type.
  pub file_type:     String,
  pub uploaded_at:   DateTime<Utc>,
}

impl FileAttachment {
  pub fn extension(&self) -> String { file_extension(&self.file_name) }

  pub fn category(&self) -> FileCategory { categorize(&self.extension()) }
}

/// Input for [`ChatStore::attach_file`](crate::store::ChatStore::attach_file).
#[derive(Debug, Clone)]
pub struct NewAttachment {
  pub blob_ref:  String,
  pub file_name: String,
  pub file_type: String,
}

/// A file received with a chat turn, not yet persisted.
#[derive(Debug, Clone)]
pub struct Upload {
  pub file_name:    String,
  pub content_type: String,
  pub data:         Bytes,
}

impl Upload {
  /// One-line description handed to the completion service.
  pub fn describe(&self) -> String {
    format!(
      "{}, {}, {} bytes",
      self.file_name,
      self.content_type,
      self.data.len()
    )
  }
}
