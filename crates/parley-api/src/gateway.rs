//! HTTP completion gateway for OpenAI-compatible chat-completions APIs.

use std::time::Duration;

use parley_core::gateway::{CompletionGateway, GatewayError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CompletionConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model:    &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role:    &'static str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
  content: Option<String>,
}

/// Sends each prompt as a single user message, optionally preceded by a
/// system message. No retries.
pub struct OpenAiGateway {
  client:        reqwest::Client,
  base_url:      String,
  api_key:       String,
  model:         String,
  system_prompt: Option<String>,
}

impl OpenAiGateway {
  pub fn new(config: &CompletionConfig) -> Result<Self, GatewayError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| GatewayError::new(format!("failed to build HTTP client: {e}")))?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      api_key: config.api_key.clone(),
      model: config.model.clone(),
      system_prompt: config.system_prompt.clone().filter(|p| !p.trim().is_empty()),
    })
  }

  fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &self.system_prompt {
      messages.push(ChatMessage { role: "system", content: system });
    }
    messages.push(ChatMessage { role: "user", content: prompt });
    ChatRequest { model: &self.model, messages }
  }
}

/// Pull the response text out of a chat-completions body.
fn response_text(body: ChatResponse) -> Result<String, GatewayError> {
  body
    .choices
    .into_iter()
    .next()
    .and_then(|choice| choice.message.content)
    .ok_or_else(|| GatewayError::new("completion response contained no text"))
}

impl CompletionGateway for OpenAiGateway {
  async fn complete(&self, prompt: String) -> Result<String, GatewayError> {
    let url = format!("{}/chat/completions", self.base_url);
    debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.api_key)
      .json(&self.request(&prompt))
      .send()
      .await
      .map_err(|e| GatewayError::new(format!("completion request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(GatewayError::new(format!(
        "completion service returned {status}: {detail}"
      )));
    }

    let body: ChatResponse = response
      .json()
      .await
      .map_err(|e| GatewayError::new(format!("invalid completion response: {e}")))?;
    response_text(body)
  }
}
