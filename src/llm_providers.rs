//! LLM provider implementations
//!
//! The agent only needs two things from a model: free-form text (the reply)
//! and small JSON answers (category guesses). Both go through
//! [`LlmProvider::complete`]; JSON answers are parsed out of the text.

use crate::ScoutError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// A single-turn chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u16,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: 400,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u16) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the name of the provider
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ScoutError>;

    /// Ask for a JSON object matching `schema` and parse it out of the reply.
    async fn generate_json(&self, prompt: String, schema: Value) -> Result<Value, ScoutError> {
        let schema_str = serde_json::to_string_pretty(&schema)?;
        let request = CompletionRequest::new(
            format!(
                "You classify product listings. Respond with valid JSON that matches \
                 this schema:\n\n{schema_str}\n\nOnly return the JSON object, no \
                 explanations or markdown."
            ),
            prompt,
        )
        .with_max_tokens(200);

        let text = self.complete(&request).await?;
        extract_json_from_text(&text).ok_or_else(|| ScoutError::ExternalServiceError {
            service: self.name().to_string(),
            message: "Could not extract valid JSON from response".to_string(),
        })
    }
}

/// Parses `text` as JSON, or the outermost `{...}` span inside it.
pub fn extract_json_from_text(text: &str) -> Option<Value> {
    if let Ok(json) = serde_json::from_str::<Value>(text.trim()) {
        return json.is_object().then_some(json);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Mock LLM provider for tests and offline demos.
///
/// Queued replies are returned in order; once drained the default reply is
/// repeated. Every request is recorded for inspection.
pub struct MockProvider {
    name: String,
    default_reply: Option<String>,
    queued: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            default_reply: Some("Mock reply".to_string()),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails, for exercising fallbacks.
    pub fn failing() -> Self {
        Self {
            default_reply: None,
            ..Self::new()
        }
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(reply.into());
        }
        self
    }

    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ScoutError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        queued
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| ScoutError::ExternalServiceError {
                service: self.name.clone(),
                message: "mock provider configured to fail".to_string(),
            })
    }
}

#[cfg(feature = "openai")]
pub mod openai {
    use super::*;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    };
    use async_openai::{config::OpenAIConfig, Client};

    pub const DEFAULT_MODEL: &str = "gpt-4o";

    fn service_error(e: impl std::fmt::Display) -> ScoutError {
        ScoutError::ExternalServiceError {
            service: "OpenAI".to_string(),
            message: e.to_string(),
        }
    }

    /// OpenAI provider implementation
    pub struct OpenAIProvider {
        client: Client<OpenAIConfig>,
        model: String,
    }

    impl OpenAIProvider {
        pub fn new(api_key: String) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            Self {
                client: Client::with_config(config),
                model: DEFAULT_MODEL.to_string(),
            }
        }

        pub fn with_model(mut self, model: String) -> Self {
            self.model = model;
            self
        }

        /// Create from custom client configuration (OpenAI-compatible gateways).
        pub fn from_config(config: OpenAIConfig, model: String) -> Self {
            Self {
                client: Client::with_config(config),
                model,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for OpenAIProvider {
        fn name(&self) -> &str {
            "openai"
        }

        fn model(&self) -> &str {
            &self.model
        }

        #[instrument(level = "debug", skip(self, request), fields(model = %self.model), err)]
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ScoutError> {
            let system_message = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(service_error)?;

            let user_message = ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.clone())
                .build()
                .map_err(service_error)?;

            let chat_request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(vec![
                    ChatCompletionRequestMessage::System(system_message),
                    ChatCompletionRequestMessage::User(user_message),
                ])
                .temperature(request.temperature)
                .max_tokens(request.max_tokens)
                .build()
                .map_err(service_error)?;

            let response = self
                .client
                .chat()
                .create(chat_request)
                .await
                .map_err(service_error)?;

            if let Some(usage) = &response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "OpenAI usage"
                );
            }

            response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| service_error("empty completion"))
        }
    }
}

pub mod anthropic {
    use super::*;
    use serde::Deserialize;

    pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
    pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
    const API_VERSION: &str = "2023-06-01";

    #[derive(Deserialize)]
    struct MessagesResponse {
        content: Vec<ContentBlock>,
    }

    #[derive(Deserialize)]
    struct ContentBlock {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        text: Option<String>,
    }

    /// Anthropic Claude provider over the Messages API.
    pub struct AnthropicProvider {
        client: reqwest::Client,
        api_key: String,
        model: String,
        base_url: String,
    }

    impl AnthropicProvider {
        pub fn new(api_key: String) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key,
                model: DEFAULT_MODEL.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
            }
        }

        pub fn with_model(mut self, model: String) -> Self {
            self.model = model;
            self
        }

        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
            self
        }
    }

    fn service_error(message: impl Into<String>) -> ScoutError {
        ScoutError::ExternalServiceError {
            service: "Anthropic".to_string(),
            message: message.into(),
        }
    }

    #[async_trait]
    impl LlmProvider for AnthropicProvider {
        fn name(&self) -> &str {
            "anthropic"
        }

        fn model(&self) -> &str {
            &self.model
        }

        #[instrument(level = "debug", skip(self, request), fields(model = %self.model), err)]
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ScoutError> {
            let body = serde_json::json!({
                "model": self.model,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "system": request.system,
                "messages": [{
                    "role": "user",
                    "content": request.user
                }]
            });

            let response = self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| service_error(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(match status.as_u16() {
                    401 | 403 => ScoutError::AuthError {
                        service: "Anthropic".to_string(),
                        message: error_text,
                    },
                    429 => ScoutError::RateLimitError(error_text),
                    code => service_error(format!("API error {code}: {error_text}")),
                });
            }

            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| ScoutError::ParseError(e.to_string()))?;

            let text: String = parsed
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("");

            if text.trim().is_empty() {
                return Err(service_error("No content in response"));
            }
            Ok(text)
        }
    }
}
