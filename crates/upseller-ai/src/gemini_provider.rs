use crate::llm_provider::*;
use crate::retry::{with_retries, ApiStatusError, DEFAULT_RETRY_BASE_DELAY};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for Google Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for the Generative Language API
    pub api_key: String,
    /// Base URL for API (default: https://generativelanguage.googleapis.com/v1beta)
    pub base_url: String,
    /// Model to use (e.g., "gemini-2.0-flash")
    pub model: String,
    /// Maximum context window
    pub context_window: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for failed requests
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_base_delay: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            context_window: 1_048_576,
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// Google Gemini LLM provider using generateContent
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!(
                "Gemini API key is required. Set GEMINI_API_KEY or GOOGLE_API_KEY environment variable."
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message], config: &GenerationConfig) -> GeminiRequest {
        GeminiRequest {
            system_instruction: system_instruction(messages).map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text { text }],
            }),
            contents: messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(GeminiContent::from_message)
                .collect(),
            generation_config: GeminiGenerationConfig {
                temperature: Some(config.temperature),
                max_output_tokens: config.max_tokens,
                top_p: config.top_p,
                stop_sequences: config.stop.clone(),
            },
        }
    }

    async fn try_request(&self, request: &GeminiRequest) -> Result<GeminiResponse> {
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.config.base_url, self.config.model
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            return Err(ApiStatusError::from_response("Gemini", response)
                .await
                .into());
        }

        response
            .json::<GeminiResponse>()
            .await
            .context("Failed to parse Gemini API response")
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let start = Instant::now();
        let request = self.build_request(messages, config);

        let response = with_retries(
            "gemini",
            self.config.max_retries,
            self.config.retry_base_delay,
            || self.try_request(&request),
        )
        .await?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(anyhow!("Gemini returned no answer ({})", reason));
        };

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(anyhow!(
                "Gemini returned an empty answer (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ));
        }

        tracing::debug!(
            provider = "gemini",
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "generateContent finished"
        );

        let usage = response.usage_metadata;
        Ok(LLMResponse {
            content,
            total_tokens: usage.as_ref().and_then(|u| u.total_token_count),
            prompt_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
            completion_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
            finish_reason: candidate.finish_reason,
            model: response
                .model_version
                .unwrap_or_else(|| self.config.model.clone()),
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
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 1200,
            supports_vision: true,
        }
    }
}

// generateContent request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn from_message(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::Assistant => "model",
            _ => "user",
        };
        let mut parts = vec![GeminiPart::Text {
            text: message.content.clone(),
        }];
        parts.extend(message.images.iter().map(|image| GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: image.media_type.clone(),
                data: image.to_base64(),
            },
        }));

        Self {
            role: Some(role),
            parts,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}
