//! `GET /attachments/{id}/`: download an uploaded file.

use axum::{
  extract::{Path, State},
  http::{HeaderValue, header},
  response::{IntoResponse, Response},
};
use parley_core::{gateway::CompletionGateway, store::ChatStore};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, blobs::sanitize_file_name, error::ApiError};

pub async fn download<S, G>(
  State(state): State<AppState<S, G>>,
  CurrentUser(principal): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  S: ChatStore + 'static,
  G: CompletionGateway + 'static,
{
  let (attachment, data) = state.chat.attachment(&principal, id).await?;

  let content_type = HeaderValue::from_str(&attachment.file_type)
    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
  let disposition = HeaderValue::from_str(&format!(
    "attachment; filename=\"{}\"",
    sanitize_file_name(&attachment.file_name)
  ))
  .map_err(|e| ApiError::Internal(e.to_string()))?;

  Ok(
    (
      [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, disposition),
      ],
      data,
    )
      .into_response(),
  )
}
