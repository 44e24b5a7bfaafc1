//! Handlers for `/history/` endpoints.
//!
//! | Method   | Path             | Notes |
//! |----------|------------------|-------|
//! | `GET`    | `/history/`      | Every conversation, newest first |
//! | `GET`    | `/history/{id}/` | 404 if absent or not the caller's |
//! | `DELETE` | `/history/{id}/` | Removes messages, attachments and files |

use axum::{
  Json,
  extract::{Path, State},
};
use parley_core::{gateway::CompletionGateway, store::ChatStore};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError, handlers::ConversationView};

#[derive(Debug, Serialize)]
pub struct ChatHistory {
  pub chat_history: Vec<ConversationView>,
}

/// `GET /history/`
pub async fn list<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
) -> Result<Json<ChatHistory>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let transcripts = state.chat.transcripts(&principal).await?;
  Ok(Json(ChatHistory {
    chat_history: transcripts.into_iter().map(ConversationView::from).collect(),
  }))
}

/// `GET /history/{id}/`
pub async fn get_one<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let transcript = state.chat.transcript(&principal, id).await?;
  Ok(Json(ConversationView::from(transcript)))
}

/// `DELETE /history/{id}/`
pub async fn delete_one<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  state.chat.delete_conversation(&principal, id).await?;
  Ok(Json(json!({ "message": "conversation deleted" })))
}
