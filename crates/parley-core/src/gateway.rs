//! The completion service seam: prompt text in, response text out.

use std::future::Future;

use thiserror::Error;

/// Any failure reported by a [`CompletionGateway`]. Never retried.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
  pub message: String,
}

impl GatewayError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// An external text-generation service.
///
/// Implementations are constructed once and injected into
/// [`ChatService`](crate::chat::ChatService); tests substitute a
/// deterministic stub.
pub trait CompletionGateway: Send + Sync {
  /// Generate a response for `prompt`.
  fn complete(
    &self,
    prompt: String,
  ) -> impl Future<Output = Result<String, GatewayError>> + Send + '_;
}
