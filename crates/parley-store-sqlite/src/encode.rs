//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::{
  attachment::FileAttachment,
  conversation::{Conversation, Message},
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub const COLUMNS: &'static str = "user_id, username, email, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      username:      row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      created_at:    row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      username:      self.username,
      email:         self.email,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `conversations` row.
pub struct RawConversation {
  pub conversation_id: String,
  pub owner_id:        String,
  pub created_at:      String,
  pub last_edited_at:  String,
}

impl RawConversation {
  pub const COLUMNS: &'static str = "conversation_id, owner_id, created_at, last_edited_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conversation_id: row.get(0)?,
      owner_id:        row.get(1)?,
      created_at:      row.get(2)?,
      last_edited_at:  row.get(3)?,
    })
  }

  pub fn into_conversation(self) -> Result<Conversation> {
    Ok(Conversation {
      conversation_id: decode_uuid(&self.conversation_id)?,
      owner_id:        decode_uuid(&self.owner_id)?,
      created_at:      decode_dt(&self.created_at)?,
      last_edited_at:  decode_dt(&self.last_edited_at)?,
    })
  }
}

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:      String,
  pub conversation_id: String,
  pub user_message:    String,
  pub ai_response:     String,
  pub created_at:      String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:      row.get(0)?,
      conversation_id: row.get(1)?,
      user_message:    row.get(2)?,
      ai_response:     row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:      decode_uuid(&self.message_id)?,
      conversation_id: decode_uuid(&self.conversation_id)?,
      user_message:    self.user_message,
      ai_response:     self.ai_response,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `attachments` row.
pub struct RawAttachment {
  pub attachment_id: String,
  pub message_id:    String,
  pub blob_ref:      String,
  pub file_name:     String,
  pub file_type:     String,
  pub uploaded_at:   String,
}

impl RawAttachment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attachment_id: row.get(0)?,
      message_id:    row.get(1)?,
      blob_ref:      row.get(2)?,
      file_name:     row.get(3)?,
      file_type:     row.get(4)?,
      uploaded_at:   row.get(5)?,
    })
  }

  pub fn into_attachment(self) -> Result<FileAttachment> {
    Ok(FileAttachment {
      attachment_id: decode_uuid(&self.attachment_id)?,
      message_id:    decode_uuid(&self.message_id)?,
      blob_ref:      self.blob_ref,
      file_name:     self.file_name,
      file_type:     self.file_type,
      uploaded_at:   decode_dt(&self.uploaded_at)?,
    })
  }
}
