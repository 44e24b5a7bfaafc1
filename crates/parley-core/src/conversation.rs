//! Conversations and the paired messages they hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::FileAttachment;

/// An owned thread of exchanges. The identifier is generated once and never
/// reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
  pub conversation_id: Uuid,
  pub owner_id:        Uuid,
  pub created_at:      DateTime<Utc>,
  /// Bumped every time a message is appended.
  pub last_edited_at:  DateTime<Utc>,
}

/// One prompt/response pair. Both halves are always populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub message_id:      Uuid,
  pub conversation_id: Uuid,
  pub user_message:    String,
  pub ai_response:     String,
  pub created_at:      DateTime<Utc>,
}

/// A message together with the files uploaded alongside it.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
  pub message:     Message,
  pub attachments: Vec<FileAttachment>,
}

/// The read model for a conversation, assembled on every read.
#[derive(Debug, Clone)]
pub struct Transcript {
  pub conversation: Conversation,
  pub title:        String,
  /// Chronological, oldest first.
  pub entries:      Vec<TranscriptEntry>,
}
