use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::Challenger;
use crate::config::{ChallengerConfig, RequestConfig};
use crate::error::{GeneratorError, GeneratorResult};
use crate::prompts;

const BACKEND: &str = "challenger";

/// Client for the challenger backend (Gemini-style `generateContent` API)
#[derive(Clone)]
pub struct ChallengerClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_config: RequestConfig,
}

/// Request body for a `generateContent` call
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

/// Response body of a `generateContent` call
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentRequest {
    fn from_prompt(prompt: String) -> Self {
        Self {
            contents: vec![ContentPart {
                parts: vec![TextPart { text: prompt }],
            }],
        }
    }
}

impl ChallengerClient {
    /// Create a new challenger client
    pub fn new(config: &ChallengerConfig, request_config: RequestConfig) -> GeneratorResult<Self> {
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

    /// Run a generation with retries and exponential backoff
    async fn generate(&self, prompt: String, label: &str) -> GeneratorResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest::from_prompt(prompt);

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
                    "Retrying challenger request"
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
                        "Challenger call succeeded"
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
                        "Challenger call failed"
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
        request: &GenerateContentRequest,
    ) -> GeneratorResult<String> {
        debug!(url = %url, "Calling challenger backend");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
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

        let body: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| GeneratorError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GeneratorError::EmptyCompletion { backend: BACKEND });
        }

        Ok(text)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Challenger for ChallengerClient {
    async fn generate_opening(&self, topic: &str) -> GeneratorResult<String> {
        self.generate(prompts::opening_prompt(topic), "opening").await
    }

    async fn generate_follow_up(
        &self,
        prior_question: &str,
        user_reply: &str,
        topic: &str,
    ) -> GeneratorResult<String> {
        self.generate(
            prompts::follow_up_prompt(prior_question, user_reply, topic),
            "follow_up",
        )
        .await
    }

    async fn health_check(&self) -> bool {
        match self.generate("Hello".to_string(), "health").await {
            Ok(text) => !text.is_empty(),
            Err(e) => {
                warn!(error = %e, "Challenger health check failed");
                false
            }
        }
    }
}
