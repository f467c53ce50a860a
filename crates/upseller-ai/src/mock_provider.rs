use crate::llm_provider::*;
use crate::meta_extract::{ANALYSIS_END, ANALYSIS_START, VERIFY_END, VERIFY_START};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Scripted reply for [`MockLLMProvider`]
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(String),
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }
}

/// Offline provider for tests and demo mode.
///
/// Queued replies are returned first; once the queue is empty it answers
/// deterministically from the prompt, emitting delimited blocks when asked
/// for a meta analysis. Message lists are kept only after
/// [`with_recording`](Self::with_recording); demo mode just counts calls.
pub struct MockLLMProvider {
    name: String,
    model: String,
    replies: Mutex<VecDeque<MockReply>>,
    always_fail: Option<String>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    recorded: Option<Mutex<Vec<Vec<Message>>>>,
}

impl MockLLMProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            model: format!("mock-{}", name),
            name,
            replies: Mutex::new(VecDeque::new()),
            always_fail: None,
            delay: None,
            call_count: AtomicUsize::new(0),
            recorded: None,
        }
    }

    /// Provider whose every call fails with `message`
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            always_fail: Some(message.into()),
            ..Self::new(name)
        }
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(replies);
        self
    }

    /// Sleep before answering, to exercise concurrent fan-out
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Keep the messages of every call for [`calls`](Self::calls)
    pub fn with_recording(mut self) -> Self {
        self.recorded = Some(Mutex::new(Vec::new()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Messages of every recorded call; empty unless recording is on
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.recorded.as_ref().map_or_else(Vec::new, |recorded| {
            recorded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    fn default_reply(&self, messages: &[Message]) -> String {
        let asks_for_meta = messages.iter().any(|m| m.content.contains(ANALYSIS_START));
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        if asks_for_meta {
            let opinions = last_user.matches("=== Einschätzung von").count();
            return format!(
                "{}\nZusammengeführte Analyse aus {} Einschätzungen ({}).\n{}\n{}\n\
                 Prüfe diese Marktanalyse kritisch und nenne Abweichungen beim Preis.\n{}",
                ANALYSIS_START, opinions, self.name, ANALYSIS_END, VERIFY_START, VERIFY_END
            );
        }

        let excerpt: String = last_user.chars().take(200).collect();
        let images: usize = messages.iter().map(|m| m.images.len()).sum();
        if images > 0 {
            format!("[{}] Antwort mit {} Bild(ern) auf: {}", self.name, images, excerpt)
        } else {
            format!("[{}] Antwort auf: {}", self.name, excerpt)
        }
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(recorded) = &self.recorded {
            recorded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(messages.to_vec());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.always_fail {
            return Err(anyhow!("{}", message));
        }

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let content = match queued {
            Some(MockReply::Text(text)) => text,
            Some(MockReply::Error(message)) => return Err(anyhow!("{}", message)),
            None => self.default_reply(messages),
        };

        Ok(LLMResponse {
            content,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: Some("stop".to_string()),
            model: self.model.clone(),
        })
    }

    async fn is_available(&self) -> bool {
        self.always_fail.is_none()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: 32_000,
            avg_latency_ms: 0,
            supports_vision: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_extract::{extract, ExtractionMethod};
    use crate::prompts;

    #[tokio::test]
    async fn test_queued_replies_come_first() {
        let provider = MockLLMProvider::new("openai")
            .with_replies([MockReply::text("eins"), MockReply::error("kaputt")]);

        assert_eq!(provider.generate("a").await.unwrap().content, "eins");
        assert_eq!(provider.generate("b").await.unwrap_err().to_string(), "kaputt");
        assert!(provider
            .generate("c")
            .await
            .unwrap()
            .content
            .contains("Antwort auf: c"));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = MockLLMProvider::failing("gemini", "quota exceeded");
        assert!(!provider.is_available().await);
        assert!(provider.generate("x").await.is_err());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_meta_reply_is_extractable() {
        let provider = MockLLMProvider::new("openai");
        let messages = vec![
            Message::system(prompts::meta_system_prompt()),
            Message::user(prompts::meta_user_prompt("Sofa", &[("A", "x"), ("B", "y")])),
        ];
        let response = provider
            .generate_chat(&messages, &GenerationConfig::default())
            .await
            .unwrap();

        let meta = extract(&response.content);
        assert_eq!(meta.method, ExtractionMethod::Markers);
        assert!(meta.market_analysis.contains("2 Einschätzungen"));
        assert!(meta.verification_prompt.is_some());
    }

    #[tokio::test]
    async fn test_messages_kept_only_when_recording() {
        let plain = MockLLMProvider::new("openai");
        plain.generate("eins").await.unwrap();
        plain.generate("zwei").await.unwrap();
        assert_eq!(plain.call_count(), 2);
        assert!(plain.calls().is_empty());

        let recording = MockLLMProvider::new("openai").with_recording();
        recording.generate("eins").await.unwrap();
        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, "eins");
    }
}
