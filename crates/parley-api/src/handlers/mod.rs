//! Route handlers and the JSON shapes they return.

pub mod account;
pub mod attachments;
pub mod chat;
pub mod history;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parley_core::{
  attachment::{FileAttachment, FileCategory},
  conversation::{Transcript, TranscriptEntry},
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a JSON request body, reporting problems as 400 with serde's message.
/// An empty body parses as `T::default()`.
pub(crate) fn parse_json<T>(body: &Bytes) -> Result<T, ApiError>
where
  T: DeserializeOwned + Default,
{
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// A persisted attachment as the client sees it.
#[derive(Debug, Serialize)]
pub struct AttachmentDescriptor {
  pub id:          Uuid,
  pub file_name:   String,
  pub file_type:   String,
  pub url:         String,
  pub category:    FileCategory,
  pub uploaded_at: DateTime<Utc>,
}

impl From<&FileAttachment> for AttachmentDescriptor {
  fn from(a: &FileAttachment) -> Self {
    Self {
      id:          a.attachment_id,
      file_name:   a.file_name.clone(),
      file_type:   a.file_type.clone(),
      url:         format!("/attachments/{}/", a.attachment_id),
      category:    a.category(),
      uploaded_at: a.uploaded_at,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
  pub message_id:   Uuid,
  pub user_message: String,
  pub ai_response:  String,
  pub created_at:   DateTime<Utc>,
  pub attachments:  Vec<AttachmentDescriptor>,
}

impl From<TranscriptEntry> for MessageView {
  fn from(entry: TranscriptEntry) -> Self {
    Self {
      attachments:  entry.attachments.iter().map(AttachmentDescriptor::from).collect(),
      message_id:   entry.message.message_id,
      user_message: entry.message.user_message,
      ai_response:  entry.message.ai_response,
      created_at:   entry.message.created_at,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
  pub conversation_id: Uuid,
  pub title:           String,
  pub created_at:      DateTime<Utc>,
  pub last_edited_at:  DateTime<Utc>,
  pub messages:        Vec<MessageView>,
}

impl From<Transcript> for ConversationView {
  fn from(t: Transcript) -> Self {
    Self {
      conversation_id: t.conversation.conversation_id,
      title:           t.title,
      created_at:      t.conversation.created_at,
      last_edited_at:  t.conversation.last_edited_at,
      messages:        t.entries.into_iter().map(MessageView::from).collect(),
    }
  }
}
