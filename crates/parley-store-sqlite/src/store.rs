//! [`SqliteStore`]: the SQLite implementation of [`ChatStore`].
//!
//! Owner scoping is part of every query: conversations are matched on
//! `owner_id`, messages and attachments are reached through a join on their
//! conversation. A row owned by another user is never loaded.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use parley_core::{
  attachment::{self, FileAttachment, NewAttachment},
  conversation::{Conversation, Message},
  store::ChatStore,
  title,
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    RawAttachment, RawConversation, RawMessage, RawUser, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley chat store backed by a single SQLite file.
///
/// The inner connection is reference-counted, so clones share it.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_user_where(&self, column: &'static str, value: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM users WHERE {column} = ?1", RawUser::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn register_user(&self, input: NewUser) -> Result<Option<User>> {
    let user = User {
      user_id:       Uuid::new_v4(),
      username:      input.username,
      email:         input.email,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let at_str   = encode_dt(user.created_at);
    let username = user.username.clone();
    let email    = user.email.clone();
    let hash     = user.password_hash.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO users (user_id, username, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(username) DO NOTHING",
          rusqlite::params![id_str, username, email, hash, at_str],
        )?;
        Ok(changed == 1)
      })
      .await?;

    if !inserted {
      debug!(username = %user.username, "username already taken");
      return Ok(None);
    }
    Ok(Some(user))
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    self.find_user_where("user_id", encode_uuid(user_id)).await
  }

  async fn find_user_by_username(&self, username: String) -> Result<Option<User>> {
    self.find_user_where("username", username).await
  }

  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Refresh-token revocation ──────────────────────────────────────────────

  async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
    let jti_str = encode_uuid(jti);
    let exp_str = encode_dt(expires_at);
    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        // Entries past their expiry can no longer be presented anyway.
        conn.execute(
          "DELETE FROM revoked_tokens WHERE expires_at < ?1",
          rusqlite::params![now_str],
        )?;
        conn.execute(
          "INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)",
          rusqlite::params![jti_str, exp_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_token_revoked(&self, jti: Uuid) -> Result<bool> {
    let jti_str = encode_uuid(jti);

    let revoked = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM revoked_tokens WHERE jti = ?1",
              rusqlite::params![jti_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(revoked)
  }

  // ── Conversations ─────────────────────────────────────────────────────────

  async fn create_conversation(&self, owner_id: Uuid) -> Result<Conversation> {
    let now = Utc::now();
    let conversation = Conversation {
      conversation_id: Uuid::new_v4(),
      owner_id,
      created_at: now,
      last_edited_at: now,
    };

    let id_str    = encode_uuid(conversation.conversation_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO conversations (conversation_id, owner_id, created_at, last_edited_at)
           VALUES (?1, ?2, ?3, ?3)",
          rusqlite::params![id_str, owner_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(conversation)
  }

  async fn find_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> Result<Option<Conversation>> {
    let id_str    = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);

    let raw: Option<RawConversation> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM conversations WHERE conversation_id = ?1 AND owner_id = ?2",
          RawConversation::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str, owner_str], RawConversation::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConversation::into_conversation).transpose()
  }

  async fn list_conversations(&self, owner_id: Uuid) -> Result<Vec<Conversation>> {
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<RawConversation> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM conversations
           WHERE owner_id = ?1
           ORDER BY created_at DESC, rowid DESC",
          RawConversation::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawConversation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConversation::into_conversation).collect()
  }

  async fn delete_conversation(&self, owner_id: Uuid, conversation_id: Uuid) -> Result<bool> {
    let id_str    = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM conversations WHERE conversation_id = ?1 AND owner_id = ?2",
          rusqlite::params![id_str, owner_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_message(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
    user_message: String,
    ai_response: String,
  ) -> Result<Option<Message>> {
    if user_message.trim().is_empty() {
      return Err(Error::Core(parley_core::Error::EmptyUserMessage));
    }

    let message = Message {
      message_id: Uuid::new_v4(),
      conversation_id,
      user_message,
      ai_response,
      created_at: Utc::now(),
    };

    let id_str    = encode_uuid(message.message_id);
    let conv_str  = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(message.created_at);
    let user_text = message.user_message.clone();
    let ai_text   = message.ai_response.clone();

    let recorded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO messages (message_id, conversation_id, user_message, ai_response, created_at)
           SELECT ?1, conversation_id, ?3, ?4, ?5
           FROM conversations
           WHERE conversation_id = ?2 AND owner_id = ?6",
          rusqlite::params![id_str, conv_str, user_text, ai_text, at_str, owner_str],
        )?;
        if inserted == 0 {
          return Ok(false);
        }
        tx.execute(
          "UPDATE conversations SET last_edited_at = ?1 WHERE conversation_id = ?2",
          rusqlite::params![at_str, conv_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(recorded.then_some(message))
  }

  async fn list_messages(&self, owner_id: Uuid, conversation_id: Uuid) -> Result<Vec<Message>> {
    let conv_str  = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.message_id, m.conversation_id, m.user_message, m.ai_response, m.created_at
           FROM messages m
           JOIN conversations c ON c.conversation_id = m.conversation_id
           WHERE m.conversation_id = ?1 AND c.owner_id = ?2
           ORDER BY m.created_at, m.rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![conv_str, owner_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn derive_title(&self, owner_id: Uuid, conversation_id: Uuid) -> Result<Option<String>> {
    let conv_str  = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);

    // Outer None: no such conversation. Inner None: no messages yet.
    let first: Option<Option<String>> = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM conversations WHERE conversation_id = ?1 AND owner_id = ?2",
            rusqlite::params![conv_str, owner_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }

        let first = conn
          .query_row(
            "SELECT user_message FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at, rowid
             LIMIT 1",
            rusqlite::params![conv_str],
            |row| row.get::<_, String>(0),
          )
          .optional()?;
        Ok(Some(first))
      })
      .await?;

    Ok(first.map(|text| title::derive_title(text.as_deref())))
  }

  // ── Attachments ───────────────────────────────────────────────────────────

  async fn attach_file(
    &self,
    owner_id: Uuid,
    message_id: Uuid,
    input: NewAttachment,
  ) -> Result<Option<FileAttachment>> {
    attachment::validate_file_name(&input.file_name)?;

    let attachment = FileAttachment {
      attachment_id: Uuid::new_v4(),
      message_id,
      blob_ref:      input.blob_ref,
      file_name:     input.file_name,
      file_type:     input.file_type,
      uploaded_at:   Utc::now(),
    };

    let id_str    = encode_uuid(attachment.attachment_id);
    let msg_str   = encode_uuid(message_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(attachment.uploaded_at);
    let blob_ref  = attachment.blob_ref.clone();
    let file_name = attachment.file_name.clone();
    let file_type = attachment.file_type.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO attachments
             (attachment_id, message_id, blob_ref, file_name, file_type, uploaded_at)
           SELECT ?1, m.message_id, ?3, ?4, ?5, ?6
           FROM messages m
           JOIN conversations c ON c.conversation_id = m.conversation_id
           WHERE m.message_id = ?2 AND c.owner_id = ?7",
          rusqlite::params![id_str, msg_str, blob_ref, file_name, file_type, at_str, owner_str],
        )?)
      })
      .await?;

    Ok((inserted > 0).then_some(attachment))
  }

  async fn list_attachments(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> Result<Vec<FileAttachment>> {
    let conv_str  = encode_uuid(conversation_id);
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<RawAttachment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT a.attachment_id, a.message_id, a.blob_ref, a.file_name, a.file_type,
                  a.uploaded_at
           FROM attachments a
           JOIN messages m      ON m.message_id      = a.message_id
           JOIN conversations c ON c.conversation_id = m.conversation_id
           WHERE m.conversation_id = ?1 AND c.owner_id = ?2
           ORDER BY a.uploaded_at, a.rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![conv_str, owner_str], RawAttachment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttachment::into_attachment).collect()
  }

  async fn find_attachment(
    &self,
    owner_id: Uuid,
    attachment_id: Uuid,
  ) -> Result<Option<FileAttachment>> {
    let id_str    = encode_uuid(attachment_id);
    let owner_str = encode_uuid(owner_id);

    let raw: Option<RawAttachment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT a.attachment_id, a.message_id, a.blob_ref, a.file_name, a.file_type,
                      a.uploaded_at
               FROM attachments a
               JOIN messages m      ON m.message_id      = a.message_id
               JOIN conversations c ON c.conversation_id = m.conversation_id
               WHERE a.attachment_id = ?1 AND c.owner_id = ?2",
              rusqlite::params![id_str, owner_str],
              RawAttachment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAttachment::into_attachment).transpose()
  }
}
