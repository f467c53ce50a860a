use std::sync::Arc;
use tracing::warn;
use upseller_ai::{Council, LLMProvider, LLMProviderFactory};
use upseller_core::UpsellerConfig;

/// Shared application state.
///
/// A provider that could not be built keeps its setup error so the page can
/// show it in place of an answer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UpsellerConfig>,
    pub optimizer: Result<Arc<dyn LLMProvider>, String>,
    pub council: Result<Arc<Council>, String>,
}

impl AppState {
    pub fn new(config: UpsellerConfig) -> Self {
        let optimizer = LLMProviderFactory::create_optimizer(&config).map_err(|e| {
            warn!("Optimizer unavailable: {}", e);
            e.to_string()
        });
        let council = LLMProviderFactory::create_council(&config)
            .map(Arc::new)
            .map_err(|e| {
                warn!("Council unavailable: {}", e);
                e.to_string()
            });

        Self {
            config: Arc::new(config),
            optimizer,
            council,
        }
    }

    /// State with explicitly supplied providers
    pub fn with_providers(
        config: UpsellerConfig,
        optimizer: Arc<dyn LLMProvider>,
        council: Council,
    ) -> Self {
        Self {
            config: Arc::new(config),
            optimizer: Ok(optimizer),
            council: Ok(Arc::new(council)),
        }
    }
}
