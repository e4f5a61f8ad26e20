use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{chat_history, ChatMessage, Defender};
use crate::config::{DefenderConfig, RequestConfig};
use crate::error::{GeneratorError, GeneratorResult};
use crate::prompts;
use crate::storage::DebateMessage;

const BACKEND: &str = "defender";

/// Client for the defender backend (chat-completions API)
#[derive(Clone)]
pub struct DefenderClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_config: RequestConfig,
}

/// Request body for a chat-completion call
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<RequestMetadata>,
}

/// Upstream request metadata
#[derive(Debug, Serialize)]
struct RequestMetadata {
    language: String,
    translation: String,
}

/// Response body of a chat-completion call
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl DefenderClient {
    /// Create a new defender client
    pub fn new(config: &DefenderConfig, request_config: RequestConfig) -> GeneratorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeneratorError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_config,
        })
    }

    fn completion_request(&self, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            stream: false,
            messages,
            temperature: Some(0.7),
            max_completion_tokens: Some(1000),
            top_p: Some(0.9),
            presence_penalty: Some(0.1),
            frequency_penalty: Some(0.1),
            metadata: Some(RequestMetadata {
                language: "en".to_string(),
                translation: "esv".to_string(),
            }),
        }
    }

    /// Assemble system prompt, chronological history, and live question
    fn build_messages(
        system_prompt: String,
        history: &[DebateMessage],
        user_prompt: String,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(chat_history(history));
        messages.push(ChatMessage::user(user_prompt));
        messages
    }

    /// Run a completion with retries and exponential backoff
    async fn complete(
        &self,
        request: ChatCompletionRequest,
        label: &str,
    ) -> GeneratorResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    call = %label,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying defender request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(text) => {
                    let latency = start.elapsed();
                    info!(
                        call = %label,
                        latency_ms = latency.as_millis(),
                        "Defender call succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        call = %label,
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "Defender call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(GeneratorError::Unavailable {
            backend: BACKEND,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &ChatCompletionRequest,
    ) -> GeneratorResult<String> {
        debug!(
            url = %url,
            messages = request.messages.len(),
            "Calling defender backend"
        );

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    GeneratorError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| GeneratorError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GeneratorError::EmptyCompletion { backend: BACKEND });
        }

        Ok(content)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Defender for DefenderClient {
    async fn generate_response(
        &self,
        question: &str,
        history: &[DebateMessage],
        topic: &str,
    ) -> GeneratorResult<String> {
        let messages = Self::build_messages(
            prompts::defender_system_prompt(topic),
            history,
            question.to_string(),
        );
        self.complete(self.completion_request(messages), "response")
            .await
    }

    async fn generate_expert_response(
        &self,
        question: &str,
        user_attempt: &str,
        history: &[DebateMessage],
        topic: &str,
    ) -> GeneratorResult<String> {
        let messages = Self::build_messages(
            prompts::expert_system_prompt(topic),
            history,
            prompts::expert_user_prompt(question, user_attempt),
        );
        self.complete(self.completion_request(messages), "expert_response")
            .await
    }

    async fn health_check(&self) -> bool {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![ChatMessage::user("Hello")],
            temperature: None,
            max_completion_tokens: Some(5),
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
            metadata: None,
        };

        match self.complete(request, "health").await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Defender health check failed");
                false
            }
        }
    }
}
