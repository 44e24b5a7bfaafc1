//! Integration tests for `SqliteStore` against an in-memory database, and for
//! `ChatService` running on top of it.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use bytes::Bytes;
use chrono::{Duration, Utc};
use parley_core::{
  ErrorKind,
  attachment::{FileCategory, NewAttachment, Upload},
  blob::{BlobKey, BlobStore},
  chat::{ChatService, TurnRequest},
  gateway::{CompletionGateway, GatewayError},
  store::ChatStore,
  title::UNTITLED,
  user::{NewUser, Principal, User},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.register_user(NewUser {
    username:      name.into(),
    email:         format!("{name}@example.com"),
    password_hash: "$argon2id$placeholder".into(),
  })
  .await
  .unwrap()
  .expect("username is free")
}

fn attachment(name: &str, content_type: &str) -> NewAttachment {
  NewAttachment {
    blob_ref:  format!("blob/{name}"),
    file_name: name.into(),
    file_type: content_type.into(),
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_find_user() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let by_name = s.find_user_by_username("alice".into()).await.unwrap().unwrap();
  assert_eq!(by_name.user_id, alice.user_id);
  assert_eq!(by_name.email, "alice@example.com");

  let by_id = s.get_user(alice.user_id).await.unwrap().unwrap();
  assert_eq!(by_id.username, "alice");
}

#[tokio::test]
async fn duplicate_username_is_refused() {
  let s = store().await;
  user(&s, "alice").await;

  let again = s
    .register_user(NewUser {
      username:      "alice".into(),
      email:         "other@example.com".into(),
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  assert!(again.is_none());
}

#[tokio::test]
async fn unknown_user_lookups_return_none() {
  let s = store().await;
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.find_user_by_username("ghost".into()).await.unwrap().is_none());
  assert!(!s.delete_user(Uuid::new_v4()).await.unwrap());
}

// ─── Token revocation ────────────────────────────────────────────────────────

#[tokio::test]
async fn revoked_tokens_are_remembered() {
  let s = store().await;
  let jti = Uuid::new_v4();
  assert!(!s.is_token_revoked(jti).await.unwrap());

  s.revoke_token(jti, Utc::now() + Duration::hours(1)).await.unwrap();
  assert!(s.is_token_revoked(jti).await.unwrap());

  // Revoking twice is harmless.
  s.revoke_token(jti, Utc::now() + Duration::hours(1)).await.unwrap();
  assert!(s.is_token_revoked(jti).await.unwrap());
}

#[tokio::test]
async fn expired_revocations_are_purged() {
  let s = store().await;
  let stale = Uuid::new_v4();
  s.revoke_token(stale, Utc::now() - Duration::hours(1)).await.unwrap();
  s.revoke_token(Uuid::new_v4(), Utc::now() + Duration::hours(1)).await.unwrap();
  assert!(!s.is_token_revoked(stale).await.unwrap());
}

// ─── Conversations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn conversations_are_listed_newest_first() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let first = s.create_conversation(alice.user_id).await.unwrap();
  let second = s.create_conversation(alice.user_id).await.unwrap();
  let third = s.create_conversation(alice.user_id).await.unwrap();

  let ids: Vec<Uuid> = s
    .list_conversations(alice.user_id)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.conversation_id)
    .collect();
  assert_eq!(ids, vec![
    third.conversation_id,
    second.conversation_id,
    first.conversation_id
  ]);
}

#[tokio::test]
async fn conversations_are_invisible_to_other_owners() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let conv = s.create_conversation(alice.user_id).await.unwrap();
  s.append_message(alice.user_id, conv.conversation_id, "hi".into(), "hello".into())
    .await
    .unwrap()
    .unwrap();

  assert!(
    s.find_conversation(bob.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_none()
  );
  assert!(s.list_conversations(bob.user_id).await.unwrap().is_empty());
  assert!(
    s.list_messages(bob.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.derive_title(bob.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    !s.delete_conversation(bob.user_id, conv.conversation_id)
      .await
      .unwrap()
  );

  // Bob cannot append either, and Alice's conversation is untouched.
  let appended = s
    .append_message(bob.user_id, conv.conversation_id, "sneaky".into(), "x".into())
    .await
    .unwrap();
  assert!(appended.is_none());
  assert_eq!(
    s.list_messages(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .len(),
    1
  );
}

#[tokio::test]
async fn deleting_a_conversation_cascades() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();
  let msg = s
    .append_message(alice.user_id, conv.conversation_id, "hi".into(), "hello".into())
    .await
    .unwrap()
    .unwrap();
  let att = s
    .attach_file(alice.user_id, msg.message_id, attachment("a.pdf", "application/pdf"))
    .await
    .unwrap()
    .unwrap();

  assert!(
    s.delete_conversation(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
  );
  assert!(
    s.find_conversation(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    s.list_messages(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.find_attachment(alice.user_id, att.attachment_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn deleting_a_user_cascades_to_everything_owned() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let conv = s.create_conversation(alice.user_id).await.unwrap();
  s.append_message(alice.user_id, conv.conversation_id, "hi".into(), "hello".into())
    .await
    .unwrap()
    .unwrap();
  let bobs = s.create_conversation(bob.user_id).await.unwrap();

  assert!(s.delete_user(alice.user_id).await.unwrap());
  assert!(s.get_user(alice.user_id).await.unwrap().is_none());
  assert!(s.list_conversations(alice.user_id).await.unwrap().is_empty());

  let remaining = s.list_conversations(bob.user_id).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].conversation_id, bobs.conversation_id);
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_are_listed_oldest_first() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();

  for i in 0..5 {
    s.append_message(
      alice.user_id,
      conv.conversation_id,
      format!("question {i}"),
      format!("answer {i}"),
    )
    .await
    .unwrap()
    .unwrap();
  }

  let texts: Vec<String> = s
    .list_messages(alice.user_id, conv.conversation_id)
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.user_message)
    .collect();
  assert_eq!(texts, (0..5).map(|i| format!("question {i}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn append_bumps_last_edited_at() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();

  let msg = s
    .append_message(alice.user_id, conv.conversation_id, "hi".into(), "hello".into())
    .await
    .unwrap()
    .unwrap();

  let reloaded = s
    .find_conversation(alice.user_id, conv.conversation_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(reloaded.last_edited_at, msg.created_at);
  assert!(reloaded.last_edited_at >= conv.created_at);
  assert_eq!(reloaded.created_at, conv.created_at);
}

#[tokio::test]
async fn empty_user_message_is_rejected() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();

  let result = s
    .append_message(alice.user_id, conv.conversation_id, "".into(), "hello".into())
    .await;
  assert!(matches!(
    result,
    Err(crate::Error::Core(parley_core::Error::EmptyUserMessage))
  ));
  let err = s
    .append_message(alice.user_id, conv.conversation_id, "  ".into(), "hello".into())
    .await
    .unwrap_err();
  assert_eq!(parley_core::Error::from(err).kind(), ErrorKind::Validation);
  assert!(
    s.list_messages(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn title_comes_from_the_first_message() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();

  let empty = s
    .derive_title(alice.user_id, conv.conversation_id)
    .await
    .unwrap();
  assert_eq!(empty.as_deref(), Some(UNTITLED));

  s.append_message(
    alice.user_id,
    conv.conversation_id,
    "hello there how are you doing today".into(),
    "fine".into(),
  )
  .await
  .unwrap()
  .unwrap();
  s.append_message(alice.user_id, conv.conversation_id, "second".into(), "ok".into())
    .await
    .unwrap()
    .unwrap();

  let title = s
    .derive_title(alice.user_id, conv.conversation_id)
    .await
    .unwrap();
  assert_eq!(title.as_deref(), Some("hello there how are you"));

  assert!(
    s.derive_title(alice.user_id, Uuid::new_v4())
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Attachments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn attachments_are_categorised_on_read() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();
  let msg = s
    .append_message(alice.user_id, conv.conversation_id, "look".into(), "ok".into())
    .await
    .unwrap()
    .unwrap();

  s.attach_file(alice.user_id, msg.message_id, attachment("report.pdf", "application/pdf"))
    .await
    .unwrap()
    .unwrap();
  s.attach_file(alice.user_id, msg.message_id, attachment("Photo.PNG", "image/png"))
    .await
    .unwrap()
    .unwrap();

  let listed = s
    .list_attachments(alice.user_id, conv.conversation_id)
    .await
    .unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].file_name, "report.pdf");
  assert_eq!(listed[0].category(), FileCategory::Document);
  assert_eq!(listed[1].extension(), ".png");
  assert_eq!(listed[1].category(), FileCategory::Image);
}

#[test]
fn store_errors_keep_their_kind() {
  let refused = crate::Error::Core(parley_core::Error::UnsupportedFileType(".exe".into()));
  assert_eq!(parley_core::Error::from(refused).kind(), ErrorKind::Validation);

  let broken = crate::Error::DateParse("yesterday".into());
  assert_eq!(parley_core::Error::from(broken).kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();
  let msg = s
    .append_message(alice.user_id, conv.conversation_id, "run".into(), "no".into())
    .await
    .unwrap()
    .unwrap();

  let result = s
    .attach_file(
      alice.user_id,
      msg.message_id,
      attachment("setup.exe", "application/octet-stream"),
    )
    .await;
  assert!(matches!(
    result,
    Err(crate::Error::Core(parley_core::Error::UnsupportedFileType(_)))
  ));
  assert!(
    s.list_attachments(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn attachments_are_scoped_to_the_owner() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let conv = s.create_conversation(alice.user_id).await.unwrap();
  let msg = s
    .append_message(alice.user_id, conv.conversation_id, "look".into(), "ok".into())
    .await
    .unwrap()
    .unwrap();
  let att = s
    .attach_file(alice.user_id, msg.message_id, attachment("a.txt", "text/plain"))
    .await
    .unwrap()
    .unwrap();

  assert!(
    s.find_attachment(bob.user_id, att.attachment_id)
      .await
      .unwrap()
      .is_none()
  );
  let foreign = s
    .attach_file(bob.user_id, msg.message_id, attachment("b.txt", "text/plain"))
    .await
    .unwrap();
  assert!(foreign.is_none());

  let found = s
    .find_attachment(alice.user_id, att.attachment_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.blob_ref, "blob/a.txt");
}

// ─── ChatService ─────────────────────────────────────────────────────────────

/// Echoes the prompt back, counting calls.
#[derive(Default)]
struct EchoGateway {
  calls: AtomicUsize,
}

impl CompletionGateway for EchoGateway {
  async fn complete(&self, prompt: String) -> Result<String, GatewayError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(format!("echo: {prompt}"))
  }
}

struct FailingGateway;

impl CompletionGateway for FailingGateway {
  async fn complete(&self, _prompt: String) -> Result<String, GatewayError> {
    Err(GatewayError::new("service unavailable"))
  }
}

#[derive(Debug, thiserror::Error)]
enum MemoryBlobError {
  #[error("memory blob store poisoned")]
  Poisoned,
  #[error("memory blob store is read-only")]
  ReadOnly,
}

use MemoryBlobError::Poisoned;

/// Blobs held in memory, keyed by `owner/conversation/uuid_name`.
#[derive(Default)]
struct MemoryBlobs {
  blobs:     Mutex<HashMap<String, Bytes>>,
  read_only: AtomicBool,
}

impl MemoryBlobs {
  fn len(&self) -> usize { self.blobs.lock().map(|b| b.len()).unwrap_or(0) }
}

impl BlobStore for MemoryBlobs {
  type Error = MemoryBlobError;

  async fn put(&self, key: BlobKey, data: Bytes) -> Result<String, MemoryBlobError> {
    if self.read_only.load(Ordering::SeqCst) {
      return Err(MemoryBlobError::ReadOnly);
    }
    let blob_ref = format!(
      "{}/{}/{}_{}",
      key.owner_id,
      key.conversation_id,
      Uuid::new_v4().simple(),
      key.file_name
    );
    self.blobs.lock().map_err(|_| Poisoned)?.insert(blob_ref.clone(), data);
    Ok(blob_ref)
  }

  async fn get(&self, blob_ref: String) -> Result<Option<Bytes>, MemoryBlobError> {
    Ok(self.blobs.lock().map_err(|_| Poisoned)?.get(&blob_ref).cloned())
  }

  async fn remove(&self, blob_ref: String) -> Result<(), MemoryBlobError> {
    self.blobs.lock().map_err(|_| Poisoned)?.remove(&blob_ref);
    Ok(())
  }

  async fn remove_conversation(
    &self,
    owner_id: Uuid,
    conversation_id: Uuid,
  ) -> Result<(), MemoryBlobError> {
    let prefix = format!("{owner_id}/{conversation_id}/");
    self
      .blobs
      .lock()
      .map_err(|_| Poisoned)?
      .retain(|k, _| !k.starts_with(&prefix));
    Ok(())
  }

  async fn remove_owner(&self, owner_id: Uuid) -> Result<(), MemoryBlobError> {
    let prefix = format!("{owner_id}/");
    self
      .blobs
      .lock()
      .map_err(|_| Poisoned)?
      .retain(|k, _| !k.starts_with(&prefix));
    Ok(())
  }
}

struct Harness<G> {
  store:   Arc<SqliteStore>,
  gateway: Arc<G>,
  blobs:   Arc<MemoryBlobs>,
  chat:    ChatService<SqliteStore, G, MemoryBlobs>,
}

async fn harness<G: CompletionGateway>(gateway: G) -> Harness<G> {
  let store = Arc::new(store().await);
  let gateway = Arc::new(gateway);
  let blobs = Arc::new(MemoryBlobs::default());
  let chat = ChatService::new(Arc::clone(&store), Arc::clone(&gateway), Arc::clone(&blobs));
  Harness { store, gateway, blobs, chat }
}

async fn principal(s: &SqliteStore, name: &str) -> Principal {
  Principal::from(&user(s, name).await)
}

fn upload(name: &str, content_type: &str, data: &'static [u8]) -> Upload {
  Upload {
    file_name:    name.into(),
    content_type: content_type.into(),
    data:         Bytes::from_static(data),
  }
}

fn turn(prompt: &str, conversation_id: Option<Uuid>) -> TurnRequest {
  TurnRequest {
    prompt: prompt.into(),
    conversation_id,
    uploads: Vec::new(),
  }
}

#[tokio::test]
async fn turn_without_id_starts_a_conversation() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let outcome = h.chat.submit_turn(&alice, turn("What is Rust?", None)).await.unwrap();
  assert_eq!(outcome.message.user_message, "What is Rust?");
  assert_eq!(outcome.message.ai_response, "echo: What is Rust?");

  let next = h
    .chat
    .submit_turn(&alice, turn("And Cargo?", Some(outcome.conversation_id)))
    .await
    .unwrap();
  assert_eq!(next.conversation_id, outcome.conversation_id);

  let transcript = h.chat.transcript(&alice, outcome.conversation_id).await.unwrap();
  assert_eq!(transcript.title, "What is Rust?");
  assert_eq!(transcript.entries.len(), 2);
  assert_eq!(transcript.entries[1].message.user_message, "And Cargo?");
}

#[tokio::test]
async fn empty_turn_persists_nothing() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let err = h.chat.submit_turn(&alice, turn("   ", None)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
  assert!(h.store.list_conversations(alice.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn gateway_failure_records_no_message() {
  let h = harness(FailingGateway).await;
  let alice = principal(&h.store, "alice").await;
  let conv = h.chat.start_conversation(&alice).await.unwrap();

  let err = h
    .chat
    .submit_turn(&alice, turn("hello", Some(conv.conversation_id)))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Upstream);
  assert!(
    h.store
      .list_messages(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn foreign_conversation_is_not_found() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;
  let bob = principal(&h.store, "bob").await;
  let conv = h.chat.start_conversation(&alice).await.unwrap();

  let err = h
    .chat
    .submit_turn(&bob, turn("mine now", Some(conv.conversation_id)))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);

  let err = h.chat.transcript(&bob, conv.conversation_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = h
    .chat
    .delete_conversation(&bob, conv.conversation_id)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(
    h.store
      .find_conversation(alice.user_id, conv.conversation_id)
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn concurrent_new_turns_get_distinct_conversations() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let (a, b) = tokio::join!(
    h.chat.submit_turn(&alice, turn("first", None)),
    h.chat.submit_turn(&alice, turn("second", None)),
  );
  let (a, b) = (a.unwrap(), b.unwrap());
  assert_ne!(a.conversation_id, b.conversation_id);
  assert_eq!(h.store.list_conversations(alice.user_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn uploads_are_described_to_the_gateway_and_stored() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let outcome = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "Summarise".into(),
      conversation_id: None,
      uploads:         vec![upload("report.pdf", "application/pdf", b"%PDF")],
    })
    .await
    .unwrap();

  assert_eq!(outcome.message.user_message, "Summarise");
  assert_eq!(
    outcome.message.ai_response,
    "echo: Summarise\n\nreport.pdf, application/pdf, 4 bytes"
  );
  assert_eq!(outcome.attachments.len(), 1);
  assert!(outcome.rejected.is_empty());

  let (meta, data) = h
    .chat
    .attachment(&alice, outcome.attachments[0].attachment_id)
    .await
    .unwrap();
  assert_eq!(meta.file_name, "report.pdf");
  assert_eq!(data, Bytes::from_static(b"%PDF"));
}

#[tokio::test]
async fn unsupported_upload_is_reported_without_rollback() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let outcome = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "Check these".into(),
      conversation_id: None,
      uploads:         vec![
        upload("notes.txt", "text/plain", b"notes"),
        upload("virus.exe", "application/octet-stream", b"MZ"),
      ],
    })
    .await
    .unwrap();

  assert_eq!(outcome.attachments.len(), 1);
  assert_eq!(outcome.attachments[0].file_name, "notes.txt");
  assert_eq!(outcome.rejected.len(), 1);
  assert_eq!(outcome.rejected[0].file_name, "virus.exe");
  assert_eq!(h.blobs.len(), 1);

  let transcript = h.chat.transcript(&alice, outcome.conversation_id).await.unwrap();
  assert_eq!(transcript.entries.len(), 1);
  assert_eq!(transcript.entries[0].attachments.len(), 1);
}

#[tokio::test]
async fn blob_write_failure_still_returns_the_turn() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;
  h.blobs.read_only.store(true, Ordering::SeqCst);

  let outcome = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "hi".into(),
      conversation_id: None,
      uploads:         vec![
        upload("a.txt", "text/plain", b"a"),
        upload("b.exe", "application/octet-stream", b"MZ"),
      ],
    })
    .await
    .unwrap();

  assert_eq!(
    outcome.message.ai_response,
    "echo: hi\n\na.txt, text/plain, 1 bytes\nb.exe, application/octet-stream, 2 bytes"
  );
  assert!(outcome.attachments.is_empty());
  assert_eq!(outcome.rejected.len(), 1);
  assert_eq!(outcome.rejected[0].file_name, "b.exe");
  assert_eq!(outcome.failed.len(), 1);
  assert_eq!(outcome.failed[0].file_name, "a.txt");
  assert!(outcome.failed[0].reason.contains("read-only"));

  let messages = h
    .store
    .list_messages(alice.user_id, outcome.conversation_id)
    .await
    .unwrap();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].message_id, outcome.message.message_id);
  assert!(
    h.store
      .list_attachments(alice.user_id, outcome.conversation_id)
      .await
      .unwrap()
      .is_empty()
  );
  assert_eq!(h.blobs.len(), 0);
}

#[tokio::test]
async fn attachment_only_turn_is_accepted() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let outcome = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          String::new(),
      conversation_id: None,
      uploads:         vec![upload("song.mp3", "audio/mpeg", b"ID3")],
    })
    .await
    .unwrap();
  assert_eq!(outcome.message.user_message, "song.mp3, audio/mpeg, 3 bytes");
}

#[tokio::test]
async fn deleting_a_conversation_removes_its_blobs() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  let doomed = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "a".into(),
      conversation_id: None,
      uploads:         vec![upload("a.txt", "text/plain", b"a")],
    })
    .await
    .unwrap();
  let kept = h
    .chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "b".into(),
      conversation_id: None,
      uploads:         vec![upload("b.txt", "text/plain", b"b")],
    })
    .await
    .unwrap();
  assert_eq!(h.blobs.len(), 2);

  h.chat
    .delete_conversation(&alice, doomed.conversation_id)
    .await
    .unwrap();
  assert_eq!(h.blobs.len(), 1);

  let remaining = h.chat.transcripts(&alice).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].conversation.conversation_id, kept.conversation_id);
}

#[tokio::test]
async fn deleting_an_account_removes_everything() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;
  let bob = principal(&h.store, "bob").await;

  h.chat
    .submit_turn(&alice, TurnRequest {
      prompt:          "a".into(),
      conversation_id: None,
      uploads:         vec![upload("a.txt", "text/plain", b"a")],
    })
    .await
    .unwrap();
  h.chat
    .submit_turn(&bob, TurnRequest {
      prompt:          "b".into(),
      conversation_id: None,
      uploads:         vec![upload("b.txt", "text/plain", b"b")],
    })
    .await
    .unwrap();

  h.chat.delete_account(&alice).await.unwrap();
  assert_eq!(h.blobs.len(), 1);
  assert!(h.store.get_user(alice.user_id).await.unwrap().is_none());
  assert_eq!(h.chat.transcripts(&bob).await.unwrap().len(), 1);

  let err = h.chat.delete_account(&alice).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn history_lists_titles_newest_first() {
  let h = harness(EchoGateway::default()).await;
  let alice = principal(&h.store, "alice").await;

  h.chat.start_conversation(&alice).await.unwrap();
  h.chat
    .submit_turn(&alice, turn("hello there how are you doing today", None))
    .await
    .unwrap();

  let titles: Vec<String> = h
    .chat
    .transcripts(&alice)
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.title)
    .collect();
  assert_eq!(titles, vec!["hello there how are you".to_owned(), UNTITLED.to_owned()]);
}
