use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    config::{ApiSettings, AssistantOptions},
    error::AppError,
    logging::SensitiveApiKey,
    models::perplexity::{ChatCompletionRequest, ChatMessage, ResponseFormat},
    prompt::SYSTEM_PROMPT,
};

/// Client for the Perplexity chat completions endpoint
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    http: Client,
    base_url: String,
    timeout: Option<Duration>,
    user_agent: String,
}

impl PerplexityClient {
    pub fn new(http: Client, api: &ApiSettings, host_version: &str) -> Self {
        Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            timeout: api.request_timeout_seconds.map(Duration::from_secs),
            user_agent: format!("HomeAssistant/{}", host_version),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send one completion request. Never retried.
    ///
    /// Returns the decoded JSON body on 2xx; a non-success status becomes
    /// [`AppError::UpstreamError`] and transport faults [`AppError::HttpRequest`].
    pub async fn send(
        &self,
        options: &AssistantOptions,
        request: &ChatCompletionRequest,
    ) -> Result<Value, AppError> {
        let url = self.endpoint();

        debug!(
            url = %url,
            api_key = %SensitiveApiKey::new(&options.api_key),
            model = %request.model,
            messages = request.messages.len(),
            disable_search = request.disable_search,
            "Sending Perplexity request"
        );

        let mut builder = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", options.api_key))
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %error_text, "Perplexity API error");
            return Err(AppError::UpstreamError {
                status,
                message: error_text,
            });
        }

        let body: Value = response.json().await?;
        Ok(body)
    }
}

/// Assemble a request: fixed preamble, status block, then the caller's messages.
pub fn build_request(
    options: &AssistantOptions,
    status_block: String,
    messages: Vec<ChatMessage>,
    model_override: Option<&str>,
    force_search: bool,
) -> ChatCompletionRequest {
    let mut all_messages = Vec::with_capacity(messages.len() + 2);
    all_messages.push(ChatMessage::system(SYSTEM_PROMPT));
    all_messages.push(ChatMessage::system(status_block));
    all_messages.extend(messages);

    let model = model_override
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| options.model.to_string());

    ChatCompletionRequest {
        model,
        messages: all_messages,
        stream: false,
        max_tokens: options.max_tokens,
        temperature: options.creativity,
        top_p: options.diversity,
        frequency_penalty: options.frequency_penalty,
        response_format: ResponseFormat::assistant_reply(),
        disable_search: !(options.enable_web_search || force_search),
    }
}
