//! [`ChatService`] coordinates a chat turn across the store, the
//! completion gateway and blob storage.
//!
//! Every operation takes the caller's [`Principal`] and forwards its id as the
//! owner-scoping parameter of each store call.

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  attachment::{self, FileAttachment, NewAttachment, Upload},
  blob::{BlobKey, BlobStore},
  conversation::{Conversation, Message, Transcript, TranscriptEntry},
  gateway::CompletionGateway,
  store::ChatStore,
  title,
  user::Principal,
};

// ─── Turn types ──────────────────────────────────────────────────────────────

/// One inbound chat turn.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
  pub prompt:          String,
  /// Continue this conversation; a new one is created when absent.
  pub conversation_id: Option<Uuid>,
  pub uploads:         Vec<Upload>,
}

/// An upload that was not attached to the persisted message.
#[derive(Debug, Clone)]
pub struct RejectedUpload {
  pub file_name: String,
  pub reason:    String,
}

/// The result of a turn. The message and the accepted attachments are kept
/// even when some uploads did not make it.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
  pub conversation_id: Uuid,
  pub message:         Message,
  pub attachments:     Vec<FileAttachment>,
  /// Uploads refused for their file type.
  pub rejected:        Vec<RejectedUpload>,
  /// Uploads that passed validation but could not be stored.
  pub failed:          Vec<RejectedUpload>,
}

/// Text sent to the completion gateway: the prompt, then a blank line and one
/// descriptive line per upload.
pub fn build_prompt(prompt: &str, uploads: &[Upload]) -> String {
  if uploads.is_empty() {
    return prompt.to_owned();
  }
  let lines = describe_uploads(uploads);
  if prompt.trim().is_empty() {
    lines
  } else {
    format!("{prompt}\n\n{lines}")
  }
}

/// Text stored as the user half of the message. This is the prompt as
/// submitted; an attachment-only turn stores its upload descriptions instead.
pub fn stored_user_text(prompt: &str, uploads: &[Upload]) -> String {
  if prompt.trim().is_empty() {
    describe_uploads(uploads)
  } else {
    prompt.to_owned()
  }
}

fn describe_uploads(uploads: &[Upload]) -> String {
  uploads
    .iter()
    .map(Upload::describe)
    .collect::<Vec<_>>()
    .join("\n")
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// The chat orchestrator. Holds no per-request state.
pub struct ChatService<S, G, B> {
  store:   Arc<S>,
  gateway: Arc<G>,
  blobs:   Arc<B>,
}

impl<S, G, B> Clone for ChatService<S, G, B> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      gateway: Arc::clone(&self.gateway),
      blobs:   Arc::clone(&self.blobs),
    }
  }
}

impl<S, G, B> ChatService<S, G, B>
where
  S: ChatStore,
  G: CompletionGateway,
  B: BlobStore,
{
  pub fn new(store: Arc<S>, gateway: Arc<G>, blobs: Arc<B>) -> Self {
    Self { store, gateway, blobs }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Start an empty conversation.
  pub async fn start_conversation(&self, principal: &Principal) -> Result<Conversation> {
    let conversation = self
      .store
      .create_conversation(principal.user_id)
      .await
      .map_err(Error::store)?;
    info!(
      user = %principal.user_id,
      conversation = %conversation.conversation_id,
      "started conversation"
    );
    Ok(conversation)
  }

  /// Run one chat turn end to end.
  ///
  /// Nothing is persisted when validation, conversation lookup or the
  /// completion call fails. Once the message exists the turn always returns
  /// it; uploads that were refused or could not be stored are listed in
  /// [`TurnOutcome::rejected`] and [`TurnOutcome::failed`] without rolling
  /// anything back.
  pub async fn submit_turn(
    &self,
    principal: &Principal,
    request: TurnRequest,
  ) -> Result<TurnOutcome> {
    let TurnRequest { prompt, conversation_id, uploads } = request;
    let owner_id = principal.user_id;

    if prompt.trim().is_empty() && uploads.is_empty() {
      return Err(Error::EmptyTurn);
    }

    let conversation = match conversation_id {
      Some(id) => self
        .store
        .find_conversation(owner_id, id)
        .await
        .map_err(Error::store)?
        .ok_or(Error::ConversationNotFound(id))?,
      None => self
        .store
        .create_conversation(owner_id)
        .await
        .map_err(Error::store)?,
    };
    let conversation_id = conversation.conversation_id;

    let ai_response = self
      .gateway
      .complete(build_prompt(&prompt, &uploads))
      .await
      .inspect_err(|e| {
        warn!(conversation = %conversation_id, error = %e, "completion failed")
      })?;

    let message = self
      .store
      .append_message(
        owner_id,
        conversation_id,
        stored_user_text(&prompt, &uploads),
        ai_response,
      )
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConversationNotFound(conversation_id))?;

    let mut attachments = Vec::with_capacity(uploads.len());
    let mut rejected = Vec::new();
    let mut failed = Vec::new();
    for upload in uploads {
      if let Err(e) = attachment::validate_file_name(&upload.file_name) {
        debug!(file = %upload.file_name, "rejected upload");
        rejected.push(RejectedUpload {
          file_name: upload.file_name,
          reason:    e.to_string(),
        });
        continue;
      }
      let file_name = upload.file_name.clone();
      match self.store_upload(owner_id, &message, upload).await {
        Ok(attachment) => attachments.push(attachment),
        Err(e) => {
          warn!(file = %file_name, error = %e, "failed to store upload");
          failed.push(RejectedUpload { file_name, reason: e.to_string() });
        }
      }
    }

    info!(
      user = %owner_id,
      conversation = %conversation_id,
      attachments = attachments.len(),
      rejected = rejected.len(),
      failed = failed.len(),
      "chat turn recorded"
    );

    Ok(TurnOutcome { conversation_id, message, attachments, rejected, failed })
  }

  /// Write the blob, then record it against `message`.
  async fn store_upload(
    &self,
    owner_id: Uuid,
    message: &Message,
    upload: Upload,
  ) -> Result<FileAttachment> {
    let key = BlobKey {
      owner_id,
      conversation_id: message.conversation_id,
      file_name: upload.file_name.clone(),
    };
    let blob_ref = self.blobs.put(key, upload.data).await.map_err(Error::blob)?;

    let recorded = self
      .store
      .attach_file(owner_id, message.message_id, NewAttachment {
        blob_ref:  blob_ref.clone(),
        file_name: upload.file_name,
        file_type: upload.content_type,
      })
      .await;

    match recorded {
      Ok(Some(attachment)) => Ok(attachment),
      Ok(None) => {
        self.blobs.remove(blob_ref).await.map_err(Error::blob)?;
        Err(Error::MessageNotFound(message.message_id))
      }
      Err(e) => {
        self.blobs.remove(blob_ref).await.map_err(Error::blob)?;
        Err(Error::store(e))
      }
    }
  }

  /// Title and chronological transcript of one conversation.
  pub async fn transcript(
    &self,
    principal: &Principal,
    conversation_id: Uuid,
  ) -> Result<Transcript> {
    let conversation = self
      .store
      .find_conversation(principal.user_id, conversation_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConversationNotFound(conversation_id))?;
    self.assemble(principal.user_id, conversation).await
  }

  /// Every conversation of the caller, newest first.
  pub async fn transcripts(&self, principal: &Principal) -> Result<Vec<Transcript>> {
    let conversations = self
      .store
      .list_conversations(principal.user_id)
      .await
      .map_err(Error::store)?;

    let mut transcripts = Vec::with_capacity(conversations.len());
    for conversation in conversations {
      transcripts.push(self.assemble(principal.user_id, conversation).await?);
    }
    Ok(transcripts)
  }

  async fn assemble(&self, owner_id: Uuid, conversation: Conversation) -> Result<Transcript> {
    let id = conversation.conversation_id;
    let messages = self
      .store
      .list_messages(owner_id, id)
      .await
      .map_err(Error::store)?;
    let attachments = self
      .store
      .list_attachments(owner_id, id)
      .await
      .map_err(Error::store)?;

    let mut by_message: HashMap<Uuid, Vec<FileAttachment>> = HashMap::new();
    for attachment in attachments {
      by_message.entry(attachment.message_id).or_default().push(attachment);
    }

    let title = title::derive_title(messages.first().map(|m| m.user_message.as_str()));
    let entries = messages
      .into_iter()
      .map(|message| TranscriptEntry {
        attachments: by_message.remove(&message.message_id).unwrap_or_default(),
        message,
      })
      .collect();

    Ok(Transcript { conversation, title, entries })
  }

  /// Delete a conversation, its blobs first and then its rows.
  pub async fn delete_conversation(
    &self,
    principal: &Principal,
    conversation_id: Uuid,
  ) -> Result<()> {
    let owner_id = principal.user_id;
    self
      .store
      .find_conversation(owner_id, conversation_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConversationNotFound(conversation_id))?;

    self
      .blobs
      .remove_conversation(owner_id, conversation_id)
      .await
      .map_err(Error::blob)?;

    let deleted = self
      .store
      .delete_conversation(owner_id, conversation_id)
      .await
      .map_err(Error::store)?;
    if !deleted {
      return Err(Error::ConversationNotFound(conversation_id));
    }

    info!(user = %owner_id, conversation = %conversation_id, "deleted conversation");
    Ok(())
  }

  /// Delete the caller's account and everything it owns.
  pub async fn delete_account(&self, principal: &Principal) -> Result<()> {
    let owner_id = principal.user_id;
    self.blobs.remove_owner(owner_id).await.map_err(Error::blob)?;

    let deleted = self.store.delete_user(owner_id).await.map_err(Error::store)?;
    if !deleted {
      return Err(Error::UserNotFound(owner_id));
    }

    info!(user = %owner_id, "deleted account");
    Ok(())
  }

  /// Metadata and contents of one of the caller's attachments.
  pub async fn attachment(
    &self,
    principal: &Principal,
    attachment_id: Uuid,
  ) -> Result<(FileAttachment, Bytes)> {
    let attachment = self
      .store
      .find_attachment(principal.user_id, attachment_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::AttachmentNotFound(attachment_id))?;

    let data = self
      .blobs
      .get(attachment.blob_ref.clone())
      .await
      .map_err(Error::blob)?
      .ok_or(Error::AttachmentNotFound(attachment_id))?;

    Ok((attachment, data))
  }
}
