use crate::llm_provider::*;
use crate::retry::{with_retries, ApiStatusError, DEFAULT_RETRY_BASE_DELAY};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const XAI_API_BASE: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for a Chat Completions provider (OpenAI or xAI)
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Bearer token
    pub api_key: String,
    /// Base URL for API (default: https://api.openai.com/v1)
    pub base_url: String,
    /// Model to use (e.g., "gpt-4.1-mini", "grok-3")
    pub model: String,
    /// Name reported by the provider ("openai" or "xai")
    pub provider_name: String,
    /// Maximum context window
    pub context_window: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for failed requests
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_base_delay: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider_name: "openai".to_string(),
            context_window: 128_000,
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl OpenAIConfig {
    /// Grok speaks the same Chat Completions dialect under its own base URL
    pub fn xai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: XAI_API_BASE.to_string(),
            model: "grok-3".to_string(),
            provider_name: "xai".to_string(),
            context_window: 131_072,
            ..Default::default()
        }
    }
}

/// LLM provider for the OpenAI Chat Completions API
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!(
                "{} API key is required",
                config.provider_name
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message], config: &GenerationConfig) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ChatMessage::from_message).collect(),
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            top_p: config.top_p,
            stop: config.stop.clone(),
        }
    }

    /// Try a single request to the Chat Completions endpoint
    async fn try_request(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .with_context(|| {
                format!("Failed to send request to {} API", self.config.provider_name)
            })?;

        if !response.status().is_success() {
            return Err(ApiStatusError::from_response(&self.config.provider_name, response)
                .await
                .into());
        }

        response.json::<ChatResponse>().await.with_context(|| {
            format!("Failed to parse {} API response", self.config.provider_name)
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let start = Instant::now();
        let request = self.build_request(messages, config);

        let response = with_retries(
            &self.config.provider_name,
            self.config.max_retries,
            self.config.retry_base_delay,
            || self.try_request(&request),
        )
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} returned no choices", self.config.provider_name))?;
        let content = choice
            .message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("{} returned an empty answer", self.config.provider_name))?;

        tracing::debug!(
            provider = %self.config.provider_name,
            model = %response.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion finished"
        );

        Ok(LLMResponse {
            content,
            total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
            prompt_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: choice.finish_reason,
            model: response.model,
        })
    }

    async fn is_available(&self) -> bool {
        let config = GenerationConfig {
            max_tokens: Some(1),
            ..Default::default()
        };
        self.generate_chat(&[Message::user("test")], &config)
            .await
            .is_ok()
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 1500,
            supports_vision: true,
        }
    }
}

// Chat Completions request/response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: MessageRole,
    content: ChatContent,
}

impl ChatMessage {
    fn from_message(message: &Message) -> Self {
        let content = if message.images.is_empty() || message.role != MessageRole::User {
            ChatContent::Text(message.content.clone())
        } else {
            let mut parts = vec![ChatContentPart::Text {
                text: message.content.clone(),
            }];
            parts.extend(message.images.iter().map(|image| ChatContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            }));
            ChatContent::Parts(parts)
        };

        Self {
            role: message.role,
            content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}
