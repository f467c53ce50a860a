use crate::anthropic_provider::{AnthropicConfig, AnthropicProvider};
use crate::council::{Council, CouncilMember, CouncilSettings};
use crate::gemini_provider::{GeminiConfig, GeminiProvider};
use crate::llm_provider::*;
use crate::mock_provider::MockLLMProvider;
use crate::openai_llm_provider::{OpenAIConfig, OpenAIProvider};
use crate::retry::DEFAULT_RETRY_BASE_DELAY;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{info, warn};
use upseller_core::{ProviderKind, UpsellerConfig};

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create one provider of the given kind
    pub fn create(kind: ProviderKind, config: &UpsellerConfig) -> Result<Arc<dyn LLMProvider>> {
        if config.use_mock {
            return Ok(Arc::new(MockLLMProvider::new(kind.as_str())));
        }

        let provider = config.providers.get(kind);
        if !provider.enabled {
            return Err(anyhow!("Provider {} is disabled in configuration", kind));
        }

        let api_key = provider
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "{} API key not found. Set 'providers.{}.api_key' in config \
                     or the {} environment variable",
                    kind.display_name(),
                    kind,
                    kind.api_key_vars().join(" / ")
                )
            })?;

        let model = provider.model_for(kind);
        let base_url = provider.base_url_for(kind);

        match kind {
            ProviderKind::OpenAI | ProviderKind::Xai => {
                let openai_config = OpenAIConfig {
                    api_key,
                    base_url,
                    model,
                    provider_name: kind.as_str().to_string(),
                    context_window: if kind == ProviderKind::Xai { 131_072 } else { 128_000 },
                    timeout_secs: provider.timeout_secs,
                    max_retries: provider.max_retries,
                    retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
                };
                Ok(Arc::new(OpenAIProvider::new(openai_config)?))
            }
            ProviderKind::Anthropic => {
                let anthropic_config = AnthropicConfig {
                    api_key,
                    base_url,
                    model,
                    timeout_secs: provider.timeout_secs,
                    max_retries: provider.max_retries,
                    ..Default::default()
                };
                Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
            }
            ProviderKind::Gemini => {
                let gemini_config = GeminiConfig {
                    api_key,
                    base_url,
                    model,
                    timeout_secs: provider.timeout_secs,
                    max_retries: provider.max_retries,
                    ..Default::default()
                };
                Ok(Arc::new(GeminiProvider::new(gemini_config)?))
            }
        }
    }

    /// Provider used by the single-text optimizer
    pub fn create_optimizer(config: &UpsellerConfig) -> Result<Arc<dyn LLMProvider>> {
        let provider = Self::create(config.optimizer.provider, config)?;
        info!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            "Optimizer provider ready"
        );
        Ok(provider)
    }

    /// Build the council from `council.providers`, skipping unconfigured ones.
    ///
    /// When the configured meta provider is unavailable the first member
    /// takes over the meta call.
    pub fn create_council(config: &UpsellerConfig) -> Result<Council> {
        let mut members = Vec::new();
        for kind in &config.council.providers {
            match Self::create(*kind, config) {
                Ok(provider) => members.push(CouncilMember::new(kind.display_name(), provider)),
                Err(e) => warn!(provider = %kind, "Skipping council member: {}", e),
            }
        }

        if members.is_empty() {
            return Err(anyhow!(
                "No council provider is configured. Set at least one API key \
                 (OPENAI_API_KEY, XAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY)"
            ));
        }

        let meta_kind = config.council.meta_provider;
        let meta = match Self::create(meta_kind, config) {
            Ok(provider) => CouncilMember::new(meta_kind.display_name(), provider),
            Err(e) => {
                let fallback = members[0].clone();
                warn!(
                    provider = %meta_kind,
                    fallback = %fallback.label,
                    "Meta provider unavailable, using first council member: {}",
                    e
                );
                fallback
            }
        };

        info!(
            members = ?members.iter().map(|m| m.label.as_str()).collect::<Vec<_>>(),
            meta = %meta.label,
            parallel = config.council.parallel,
            "Council ready"
        );

        Ok(Council::new(
            members,
            meta,
            CouncilSettings::from(&config.council),
        ))
    }

    /// Get a list of supported providers
    pub fn supported_providers() -> Vec<&'static str> {
        ProviderKind::ALL.iter().map(|k| k.as_str()).collect()
    }
}
