//! Multi-provider analysis: every member gives an opinion, one meta call fuses them.

use crate::llm_provider::{GenerationConfig, LLMProvider, Message};
use crate::meta_extract::{self, MetaAnalysis};
use crate::prompts;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use upseller_core::{CouncilConfig, ImageAttachment};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CouncilError {
    #[error("Keine KI hat geantwortet ({})", .failures.join("; "))]
    NoOpinions { failures: Vec<String> },
}

/// A provider taking part in the council, with the label shown to users
#[derive(Clone)]
pub struct CouncilMember {
    pub label: String,
    pub provider: Arc<dyn LLMProvider>,
}

impl CouncilMember {
    pub fn new(label: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            label: label.into(),
            provider,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CouncilSettings {
    pub parallel: bool,
    pub opinion: GenerationConfig,
    pub meta: GenerationConfig,
}

impl Default for CouncilSettings {
    fn default() -> Self {
        Self::from(&CouncilConfig::default())
    }
}

impl From<&CouncilConfig> for CouncilSettings {
    fn from(config: &CouncilConfig) -> Self {
        Self {
            parallel: config.parallel,
            opinion: GenerationConfig::new(config.temperature, config.opinion_max_tokens),
            meta: GenerationConfig::new(config.temperature, config.meta_max_tokens),
        }
    }
}

/// What the council is asked to analyse
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub brief: String,
    pub image: Option<ImageAttachment>,
}

impl AnalysisRequest {
    pub fn new(brief: impl Into<String>) -> Self {
        Self {
            brief: brief.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderOpinion {
    pub label: String,
    pub model: String,
    pub outcome: Result<String, String>,
    pub duration_ms: u64,
}

impl ProviderOpinion {
    pub fn text(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CouncilReport {
    pub run_id: Uuid,
    pub opinions: Vec<ProviderOpinion>,
    pub meta_label: String,
    pub meta: Option<MetaAnalysis>,
    pub meta_error: Option<String>,
}

impl CouncilReport {
    pub fn successful(&self) -> impl Iterator<Item = &ProviderOpinion> {
        self.opinions.iter().filter(|o| o.outcome.is_ok())
    }
}

pub struct Council {
    members: Vec<CouncilMember>,
    meta: CouncilMember,
    settings: CouncilSettings,
}

impl Council {
    pub fn new(members: Vec<CouncilMember>, meta: CouncilMember, settings: CouncilSettings) -> Self {
        Self {
            members,
            meta,
            settings,
        }
    }

    pub fn members(&self) -> &[CouncilMember] {
        &self.members
    }

    pub fn meta_member(&self) -> &CouncilMember {
        &self.meta
    }

    pub fn settings(&self) -> &CouncilSettings {
        &self.settings
    }

    fn opinion_messages(&self, member: &CouncilMember, request: &AnalysisRequest) -> Vec<Message> {
        let mut user = prompts::opinion_user_prompt(&request.brief, request.image.is_some());
        let mut image = None;
        if let Some(attachment) = &request.image {
            if member.provider.characteristics().supports_vision {
                image = Some(attachment.clone());
            } else {
                user.push_str(prompts::IMAGE_UNSUPPORTED_NOTE);
            }
        }

        let mut message = Message::user(user);
        if let Some(image) = image {
            message = message.with_image(image);
        }
        vec![Message::system(prompts::OPINION_SYSTEM_PROMPT), message]
    }

    async fn ask(&self, member: &CouncilMember, request: &AnalysisRequest) -> ProviderOpinion {
        let start = Instant::now();
        let messages = self.opinion_messages(member, request);
        let result = member
            .provider
            .generate_chat(&messages, &self.settings.opinion)
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(response) => {
                info!(member = %member.label, duration_ms, "Opinion received");
                Ok(response.content)
            }
            Err(e) => {
                warn!(member = %member.label, error = %e, "Opinion failed");
                Err(e.to_string())
            }
        };

        ProviderOpinion {
            label: member.label.clone(),
            model: member.provider.model_name().to_string(),
            outcome,
            duration_ms,
        }
    }

    /// Ask every member, in configured order.
    ///
    /// A failing member records its error and does not stop the others.
    pub async fn gather_opinions(&self, request: &AnalysisRequest) -> Vec<ProviderOpinion> {
        if self.settings.parallel {
            join_all(self.members.iter().map(|m| self.ask(m, request))).await
        } else {
            let mut opinions = Vec::with_capacity(self.members.len());
            for member in &self.members {
                opinions.push(self.ask(member, request).await);
            }
            opinions
        }
    }

    /// Gather opinions and fuse them with the meta provider
    pub async fn run(&self, request: &AnalysisRequest) -> Result<CouncilReport, CouncilError> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            members = self.members.len(),
            parallel = self.settings.parallel,
            has_image = request.image.is_some(),
            "Council run started"
        );

        let opinions = self.gather_opinions(request).await;

        let successful: Vec<(&str, &str)> = opinions
            .iter()
            .filter_map(|o| o.text().map(|t| (o.label.as_str(), t)))
            .collect();

        if successful.is_empty() {
            let failures = opinions
                .iter()
                .map(|o| format!("{}: {}", o.label, o.error().unwrap_or("keine Antwort")))
                .collect();
            warn!(%run_id, "No council member answered");
            return Err(CouncilError::NoOpinions { failures });
        }

        let messages = vec![
            Message::system(prompts::meta_system_prompt()),
            Message::user(prompts::meta_user_prompt(&request.brief, &successful)),
        ];

        let (meta, meta_error) = match self
            .meta
            .provider
            .generate_chat(&messages, &self.settings.meta)
            .await
        {
            Ok(response) => {
                let meta = meta_extract::extract(&response.content);
                info!(%run_id, method = ?meta.method, "Meta analysis extracted");
                (Some(meta), None)
            }
            Err(e) => {
                warn!(%run_id, meta = %self.meta.label, error = %e, "Meta analysis failed");
                (None, Some(e.to_string()))
            }
        };

        Ok(CouncilReport {
            run_id,
            opinions,
            meta_label: self.meta.label.clone(),
            meta,
            meta_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_extract::ExtractionMethod;
    use crate::mock_provider::{MockLLMProvider, MockReply};
    use std::time::Duration;

    fn member(label: &str, provider: MockLLMProvider) -> (CouncilMember, Arc<MockLLMProvider>) {
        let provider = Arc::new(provider);
        (CouncilMember::new(label, provider.clone()), provider)
    }

    fn settings(parallel: bool) -> CouncilSettings {
        CouncilSettings {
            parallel,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failing_member_is_isolated() {
        let (a, _) = member("OpenAI", MockLLMProvider::new("openai").with_replies([MockReply::text("A sagt gut")]));
        let (b, _) = member("Grok", MockLLMProvider::failing("xai", "timeout"));
        let (c, _) = member("Claude", MockLLMProvider::new("anthropic").with_replies([MockReply::text("C sagt teuer")]));
        let (meta, meta_mock) = member("OpenAI", MockLLMProvider::new("openai").with_recording());

        let council = Council::new(vec![a, b, c], meta, settings(false));
        let report = council.run(&AnalysisRequest::new("Sofa")).await.unwrap();

        let labels: Vec<_> = report.opinions.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["OpenAI", "Grok", "Claude"]);
        assert_eq!(report.opinions[1].error(), Some("timeout"));
        assert_eq!(report.successful().count(), 2);

        let meta_calls = meta_mock.calls();
        let meta_prompt = &meta_calls[0][1].content;
        assert!(meta_prompt.contains("A sagt gut"));
        assert!(meta_prompt.contains("C sagt teuer"));
        assert!(!meta_prompt.contains("Grok"));

        let meta = report.meta.unwrap();
        assert_eq!(meta.method, ExtractionMethod::Markers);
        assert!(meta.market_analysis.contains("2 Einschätzungen"));
    }

    #[tokio::test]
    async fn test_all_members_failing_is_an_error() {
        let (a, _) = member("OpenAI", MockLLMProvider::failing("openai", "401"));
        let (b, _) = member("Gemini", MockLLMProvider::failing("gemini", "quota"));
        let (meta, meta_mock) = member("OpenAI", MockLLMProvider::new("openai"));

        let council = Council::new(vec![a, b], meta, settings(false));
        let err = council.run(&AnalysisRequest::new("Sofa")).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("OpenAI: 401"));
        assert!(message.contains("Gemini: quota"));
        assert_eq!(meta_mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_meta_failure_keeps_opinions() {
        let (a, _) = member("Claude", MockLLMProvider::new("anthropic"));
        let (meta, _) = member("OpenAI", MockLLMProvider::failing("openai", "overloaded"));

        let council = Council::new(vec![a], meta, settings(false));
        let report = council.run(&AnalysisRequest::new("Sofa")).await.unwrap();

        assert!(report.meta.is_none());
        assert_eq!(report.meta_error.as_deref(), Some("overloaded"));
        assert_eq!(report.opinions.len(), 1);
        assert!(report.opinions[0].text().is_some());
    }

    #[tokio::test]
    async fn test_parallel_mode_preserves_order() {
        let (slow, _) = member(
            "Langsam",
            MockLLMProvider::new("slow")
                .with_delay(Duration::from_millis(50))
                .with_replies([MockReply::text("erst")]),
        );
        let (fast, _) = member("Schnell", MockLLMProvider::new("fast").with_replies([MockReply::text("dann")]));
        let (meta, _) = member("Meta", MockLLMProvider::new("meta"));

        let council = Council::new(vec![slow, fast], meta, settings(true));
        let opinions = council.gather_opinions(&AnalysisRequest::new("Sofa")).await;

        assert_eq!(opinions[0].label, "Langsam");
        assert_eq!(opinions[0].text(), Some("erst"));
        assert_eq!(opinions[1].text(), Some("dann"));
    }

    #[tokio::test]
    async fn test_image_is_forwarded_to_members() {
        let (a, a_mock) = member("OpenAI", MockLLMProvider::new("openai").with_recording());
        let (meta, meta_mock) = member("Meta", MockLLMProvider::new("meta").with_recording());
        let image = ImageAttachment {
            media_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };

        let council = Council::new(vec![a], meta, settings(false));
        let request = AnalysisRequest::new("Sofa").with_image(Some(image));
        council.run(&request).await.unwrap();

        let calls = a_mock.calls();
        assert_eq!(calls[0][1].images.len(), 1);
        assert!(calls[0][1].content.contains("Produktfoto"));
        assert!(meta_mock.calls()[0].iter().all(|m| m.images.is_empty()));
    }
}
