//! Chat handlers.
//!
//! `POST /chat/` accepts either a JSON body `{"message", "conversation_id"?}`
//! or `multipart/form-data` with `message`, `conversation_id` and any number
//! of file fields.

use axum::{
  Json,
  extract::{FromRequest, Multipart, Request, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parley_core::{
  attachment::Upload,
  chat::{RejectedUpload, TurnOutcome, TurnRequest},
  gateway::CompletionGateway,
  store::ChatStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  error::ApiError,
  handlers::{AttachmentDescriptor, parse_json},
};

// ─── Start ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Started {
  pub conversation_id: Uuid,
  pub created_at:      DateTime<Utc>,
}

/// `POST /conversations/`
pub async fn start<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let conversation = state.chat.start_conversation(&principal).await?;
  Ok((
    StatusCode::CREATED,
    Json(Started {
      conversation_id: conversation.conversation_id,
      created_at:      conversation.created_at,
    }),
  ))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
  #[serde(default)]
  pub message:         String,
  pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RejectedFile {
  pub file_name: String,
  pub reason:    String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:           Option<String>,
  pub conversation_id: Uuid,
  pub ai_response:     String,
  pub attachments:     Vec<AttachmentDescriptor>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub rejected:        Vec<RejectedFile>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failed:          Vec<RejectedFile>,
}

impl TurnResponse {
  /// A storage failure outranks a refused file type.
  pub fn status(&self) -> StatusCode {
    if !self.failed.is_empty() {
      StatusCode::INTERNAL_SERVER_ERROR
    } else if !self.rejected.is_empty() {
      StatusCode::BAD_REQUEST
    } else {
      StatusCode::OK
    }
  }
}

fn rejected_files(uploads: Vec<RejectedUpload>) -> Vec<RejectedFile> {
  uploads
    .into_iter()
    .map(|r| RejectedFile { file_name: r.file_name, reason: r.reason })
    .collect()
}

impl From<TurnOutcome> for TurnResponse {
  fn from(outcome: TurnOutcome) -> Self {
    let rejected = rejected_files(outcome.rejected);
    let failed = rejected_files(outcome.failed);
    let reasons: Vec<&str> = rejected
      .iter()
      .chain(&failed)
      .map(|r| r.reason.as_str())
      .collect();
    let error = (!reasons.is_empty()).then(|| reasons.join("; "));

    Self {
      error,
      conversation_id: outcome.conversation_id,
      ai_response: outcome.message.ai_response,
      attachments: outcome.attachments.iter().map(AttachmentDescriptor::from).collect(),
      rejected,
      failed,
    }
  }
}

/// Absent or blank means "start a new conversation".
fn parse_conversation_id(raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(None),
    Some(s) => Uuid::parse_str(s)
      .map(Some)
      .map_err(|_| ApiError::BadRequest(format!("invalid conversation_id: {s}"))),
  }
}

async fn read_multipart(mut multipart: Multipart) -> Result<TurnRequest, ApiError> {
  let mut request = TurnRequest::default();

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
  {
    let name = field.name().unwrap_or_default().to_owned();

    if let Some(file_name) = field.file_name().map(str::to_owned) {
      // Browsers submit an unnamed empty part for an untouched file input.
      if file_name.is_empty() {
        continue;
      }
      let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
      let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read {file_name}: {e}")))?;
      request.uploads.push(Upload { file_name, content_type, data });
      continue;
    }

    let text = field
      .text()
      .await
      .map_err(|e| ApiError::BadRequest(format!("failed to read field {name}: {e}")))?;
    match name.as_str() {
      "message" => request.prompt = text,
      "conversation_id" => request.conversation_id = parse_conversation_id(Some(&text))?,
      _ => {}
    }
  }

  Ok(request)
}

/// `POST /chat/`
pub async fn submit<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  req: Request,
) -> Result<Response, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let is_multipart = req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.starts_with("multipart/form-data"));

  let turn = if is_multipart {
    let multipart = Multipart::from_request(req, &state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    read_multipart(multipart).await?
  } else {
    let body = Bytes::from_request(req, &state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let body: ChatBody = parse_json(&body)?;
    TurnRequest {
      prompt:          body.message,
      conversation_id: parse_conversation_id(body.conversation_id.as_deref())?,
      uploads:         Vec::new(),
    }
  };

  let outcome = state.chat.submit_turn(&principal, turn).await?;
  let response = TurnResponse::from(outcome);
  Ok((response.status(), Json(response)).into_response())
}
