use serde_json::json;
use std::time::Duration;
use upseller_ai::anthropic_provider::{AnthropicConfig, AnthropicProvider};
use upseller_ai::gemini_provider::{GeminiConfig, GeminiProvider};
use upseller_ai::openai_llm_provider::{OpenAIConfig, OpenAIProvider};
use upseller_ai::{GenerationConfig, LLMProvider, Message};
use upseller_core::ImageAttachment;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4.1-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

fn openai_config(server: &MockServer) -> OpenAIConfig {
    OpenAIConfig {
        api_key: "sk-test".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        retry_base_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

fn messages() -> Vec<Message> {
    vec![
        Message::system("Du bist UPSELLER PRO"),
        Message::user("Verkaufe Fahrrad"),
    ]
}

#[tokio::test]
async fn openai_chat_completion_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4.1-mini",
            "max_tokens": 450,
            "messages": [
                {"role": "system", "content": "Du bist UPSELLER PRO"},
                {"role": "user", "content": "Verkaufe Fahrrad"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("  Top Fahrrad!  ")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(openai_config(&server)).unwrap();
    let response = provider
        .generate_chat(&messages(), &GenerationConfig::new(0.7, 450))
        .await
        .unwrap();

    assert_eq!(response.content, "Top Fahrrad!");
    assert_eq!(response.total_tokens, Some(17));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn xai_uses_its_own_name_in_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let config = OpenAIConfig {
        base_url: server.uri(),
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1),
        ..OpenAIConfig::xai("xai-test")
    };
    let provider = OpenAIProvider::new(config).unwrap();
    let err = provider.generate("hi").await.unwrap_err().to_string();

    assert!(err.contains("xai API error"), "{}", err);
    assert!(err.contains("401"), "{}", err);
    assert!(err.contains("invalid api key"), "{}", err);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("zweiter Versuch")))
        .expect(1)
        .mount(&server)
        .await;

    let config = OpenAIConfig {
        max_retries: 2,
        ..openai_config(&server)
    };
    let provider = OpenAIProvider::new(config).unwrap();
    let response = provider.generate("hi").await.unwrap();

    assert_eq!(response.content, "zweiter Versuch");
}

#[tokio::test]
async fn empty_openai_answer_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("   ")))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(openai_config(&server)).unwrap();
    assert!(provider.generate("hi").await.is_err());
}

#[tokio::test]
async fn anthropic_messages_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "system": "Du bist UPSELLER PRO",
            "messages": [{"role": "user", "content": "Verkaufe Fahrrad"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Klingt "},
                {"type": "text", "text": "gut."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 20, "output_tokens": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(AnthropicConfig {
        api_key: "ant-test".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();
    let response = provider
        .generate_chat(&messages(), &GenerationConfig::default())
        .await
        .unwrap();

    assert_eq!(response.content, "Klingt gut.");
    assert_eq!(response.total_tokens, Some(24));
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn gemini_generate_content_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Du bist UPSELLER PRO"}]},
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": "Verkaufe Fahrrad"},
                    {"inlineData": {"mimeType": "image/gif", "data": "R0lGODlh"}}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Schönes Rad."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3, "totalTokenCount": 12},
            "modelVersion": "gemini-2.0-flash-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(GeminiConfig {
        api_key: "g-test".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();

    let image = ImageAttachment {
        media_type: "image/gif".to_string(),
        data: b"GIF89a".to_vec(),
    };
    let messages = vec![
        Message::system("Du bist UPSELLER PRO"),
        Message::user("Verkaufe Fahrrad").with_image(image),
    ];
    let response = provider
        .generate_chat(&messages, &GenerationConfig::default())
        .await
        .unwrap();

    assert_eq!(response.content, "Schönes Rad.");
    assert_eq!(response.model, "gemini-2.0-flash-001");
    assert_eq!(response.total_tokens, Some(12));
}

#[tokio::test]
async fn gemini_blocked_prompt_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(GeminiConfig {
        api_key: "g-test".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();

    let err = provider.generate("hi").await.unwrap_err().to_string();
    assert!(err.contains("SAFETY"), "{}", err);
}
