use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::sync::Arc;
use upseller_ai::{Council, CouncilMember, CouncilSettings, MockLLMProvider, MockReply};
use upseller_api::{create_router, AppState};
use upseller_core::{client_state, ConversationHistory, UpsellerConfig};

const PNG: [u8; 16] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

fn mock_config() -> UpsellerConfig {
    UpsellerConfig {
        use_mock: true,
        ..Default::default()
    }
}

fn server(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

fn mock_council(members: Vec<(&str, Arc<MockLLMProvider>)>) -> Council {
    let members: Vec<CouncilMember> = members
        .into_iter()
        .map(|(label, provider)| CouncilMember::new(label, provider))
        .collect();
    let meta = CouncilMember::new("OpenAI", Arc::new(MockLLMProvider::new("meta")));
    Council::new(members, meta, CouncilSettings::default())
}

fn scripted_state(optimizer: Arc<MockLLMProvider>) -> AppState {
    let council = mock_council(vec![("OpenAI", Arc::new(MockLLMProvider::new("openai")))]);
    AppState::with_providers(mock_config(), optimizer, council)
}

/// Value of a hidden input in a rendered page
fn hidden_value(html: &str, name: &str) -> String {
    let marker = format!(r#"name="{}" value=""#, name);
    let start = html.find(&marker).expect("hidden field present") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

#[tokio::test]
async fn health_reports_mock_providers() {
    let server = server(AppState::new(mock_config()));

    let resp = server.get("/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["mock"], true);
    assert_eq!(body["configured_providers"].as_array().unwrap().len(), 4);
    assert_eq!(body["council"]["members"].as_array().unwrap().len(), 4);
    assert_eq!(body["optimizer"]["model"], "mock-openai");
}

#[tokio::test]
async fn health_is_degraded_without_keys() {
    let server = server(AppState::new(UpsellerConfig::default()));

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
    assert!(body["optimizer"].is_null());
    assert!(body["council"].is_null());
}

#[tokio::test]
async fn start_page_serves_html_form() {
    let server = server(AppState::new(mock_config()));

    let resp = server.get("/").await;
    assert_eq!(resp.status_code(), 200);
    let ct = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(ct.contains("text/html"), "expected HTML content-type");

    let html = resp.text();
    assert!(html.contains("Upseller PRO"));
    assert!(html.contains(r#"<textarea name="text""#));
    assert!(html.contains("Mit KI optimieren"));
}

#[tokio::test]
async fn optimize_renders_answer_and_carries_history() {
    let optimizer = Arc::new(
        MockLLMProvider::new("openai")
            .with_replies([
                MockReply::text("Traumhaftes Sofa <neu>\nSofort abholbereit"),
                MockReply::text("Kurz: Traumsofa"),
            ])
            .with_recording(),
    );
    let server = server(scripted_state(optimizer.clone()));

    let resp = server
        .post("/")
        .form(&[("text", "Verkaufe Sofa"), ("history", "")])
        .await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Upseller-PRO Antwort:"));
    assert!(html.contains("Traumhaftes Sofa &lt;neu&gt;<br>Sofort abholbereit"));

    let token = hidden_value(&html, "history");
    let history: ConversationHistory = client_state::decode(&token).unwrap();
    assert_eq!(history.len(), 2);

    let resp = server
        .post("/")
        .form(&[("text", "kürzer"), ("history", token.as_str())])
        .await;
    assert!(resp.text().contains("Kurz: Traumsofa"));

    let calls = optimizer.calls();
    assert_eq!(calls.len(), 2);
    // system + previous user/assistant pair + follow-up
    assert_eq!(calls[1].len(), 4);
    assert!(calls[1][3].content.contains("kürzer"));
    assert!(calls[0][1].content.starts_with("Hier ist der Originaltext"));
}

#[tokio::test]
async fn long_conversation_keeps_accepting_its_own_history() {
    let server = server(AppState::new(mock_config()));
    let long_text = "x".repeat(upseller_api::handlers::MAX_INPUT_CHARS);
    let mut token = String::new();

    for round in 1..=8 {
        let resp = server
            .post("/")
            .form(&[("text", long_text.as_str()), ("history", token.as_str())])
            .await;
        assert_eq!(resp.status_code(), 200, "round {} rejected the history", round);

        token = hidden_value(&resp.text(), "history");
        assert!(token.len() <= client_state::MAX_TOKEN_BYTES);

        let history: ConversationHistory = client_state::decode(&token).unwrap();
        assert!(history.len() >= 2);
        assert_eq!(history.len() % 2, 0);
    }
}

#[tokio::test]
async fn optimize_rejects_empty_text() {
    let optimizer = Arc::new(MockLLMProvider::new("openai"));
    let server = server(scripted_state(optimizer.clone()));

    let resp = server.post("/").form(&[("text", "   ")]).await;
    assert_eq!(resp.status_code(), 400);
    assert!(resp.text().contains("Bitte gib einen Text ein."));
    assert_eq!(optimizer.call_count(), 0);
}

#[tokio::test]
async fn optimize_rejects_tampered_history() {
    let server = server(AppState::new(mock_config()));

    let resp = server
        .post("/")
        .form(&[("text", "Sofa"), ("history", "%%%not-base64%%%")])
        .await;
    assert_eq!(resp.status_code(), 400);
    assert!(resp.text().contains("Ungültiger Fortschritt"));
}

#[tokio::test]
async fn provider_failure_is_shown_on_page() {
    let optimizer = Arc::new(MockLLMProvider::failing("openai", "rate limited"));
    let server = server(scripted_state(optimizer));

    let resp = server.post("/").form(&[("text", "Verkaufe Sofa")]).await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Fehler bei der KI-Anfrage: rate limited"));
    // input is kept for another attempt
    assert!(html.contains(">Verkaufe Sofa</textarea>"));
}

#[tokio::test]
async fn missing_api_key_is_shown_on_page() {
    let server = server(AppState::new(UpsellerConfig::default()));

    let resp = server.post("/").form(&[("text", "Verkaufe Sofa")]).await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Fehler bei der KI-Anfrage:"));
    assert!(html.contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn questionnaire_walks_through_all_levels() {
    let server = server(AppState::new(mock_config()));

    let html = server.get("/questionnaire").await.text();
    assert!(html.contains("Frage 1 von 8"));
    let mut token = hidden_value(&html, "state");

    for level in 1..=7 {
        let answer = format!("Antwort {}", level);
        let resp = server
            .post("/questionnaire")
            .form(&[("state", token.as_str()), ("answer", answer.as_str())])
            .await;
        assert_eq!(resp.status_code(), 200);
        let html = resp.text();
        assert!(
            html.contains(&format!("Frage {} von 8", level + 1)),
            "level {} did not advance",
            level
        );
        token = hidden_value(&html, "state");
    }

    let resp = server
        .post("/questionnaire")
        .form(&[("state", token.as_str()), ("answer", "Nur Abholung")])
        .await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Deine Angaben"));
    assert!(html.contains("Nur Abholung"));
    assert!(html.contains("Marktanalyse (OpenAI):"));
    assert!(html.contains("Prompt zur Gegenprüfung"));
    assert!(html.contains("Einzelne Einschätzungen"));
}

#[tokio::test]
async fn questionnaire_empty_answer_stays_on_level() {
    let server = server(AppState::new(mock_config()));
    let token = hidden_value(&server.get("/questionnaire").await.text(), "state");

    let resp = server
        .post("/questionnaire")
        .form(&[("state", token.as_str()), ("answer", "  ")])
        .await;
    assert_eq!(resp.status_code(), 400);
    let html = resp.text();
    assert!(html.contains("Frage 1 von 8"));
    assert!(html.contains("Bitte gib eine Antwort ein."));
}

#[tokio::test]
async fn questionnaire_rejects_skipped_levels() {
    let server = server(AppState::new(mock_config()));
    let forged = client_state::encode(&serde_json::json!({"level": 8, "answers": {"1": "a"}})).unwrap();

    let resp = server
        .post("/questionnaire")
        .form(&[("state", forged.as_str()), ("answer", "b")])
        .await;
    assert_eq!(resp.status_code(), 400);
    assert!(resp.text().contains("Ungültiger Fortschritt"));
}

#[tokio::test]
async fn questionnaire_restart_discards_state() {
    let server = server(AppState::new(mock_config()));

    let resp = server
        .post("/questionnaire")
        .form(&[("state", "garbage"), ("restart", "1")])
        .await;
    assert_eq!(resp.status_code(), 200);
    assert!(resp.text().contains("Frage 1 von 8"));
}

#[tokio::test]
async fn analyze_forwards_image_to_council() {
    let member = Arc::new(MockLLMProvider::new("anthropic").with_recording());
    let council = mock_council(vec![("Claude", member.clone())]);
    let state = AppState::with_providers(
        mock_config(),
        Arc::new(MockLLMProvider::new("openai")),
        council,
    );
    let server = server(state);

    let form = MultipartForm::new()
        .add_text("text", "Gebrauchtes Rennrad, Größe M")
        .add_part(
            "image",
            Part::bytes(PNG.to_vec())
                .file_name("rad.png")
                .mime_type("image/png"),
        );
    let resp = server.post("/analyze").multipart(form).await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Marktanalyse (OpenAI):"));
    assert!(html.contains("Claude"));

    let calls = member.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][1].images.len(), 1);
    assert_eq!(calls[0][1].images[0].media_type, "image/png");
}

#[tokio::test]
async fn analyze_without_image() {
    let server = server(AppState::new(mock_config()));

    let form = MultipartForm::new()
        .add_text("text", "Vintage Lampe")
        .add_part("image", Part::bytes(Vec::new()).file_name(""));
    let resp = server.post("/analyze").multipart(form).await;
    assert_eq!(resp.status_code(), 200);
    assert!(resp.text().contains("Einzelne Einschätzungen"));
}

#[tokio::test]
async fn analyze_rejects_non_image_upload() {
    let server = server(AppState::new(mock_config()));

    let form = MultipartForm::new()
        .add_text("text", "Lampe")
        .add_part(
            "image",
            Part::bytes(b"%PDF-1.7 not an image".to_vec())
                .file_name("lampe.pdf")
                .mime_type("application/pdf"),
        );
    let resp = server.post("/analyze").multipart(form).await;
    assert_eq!(resp.status_code(), 400);
    assert!(resp.text().contains("Unbekanntes Bildformat"));
}

#[tokio::test]
async fn analyze_reports_when_no_provider_answers() {
    let council = mock_council(vec![
        ("OpenAI", Arc::new(MockLLMProvider::failing("openai", "401 Unauthorized"))),
        ("Gemini", Arc::new(MockLLMProvider::failing("gemini", "quota"))),
    ]);
    let state = AppState::with_providers(
        mock_config(),
        Arc::new(MockLLMProvider::new("openai")),
        council,
    );
    let server = server(state);

    let form = MultipartForm::new().add_text("text", "Lampe");
    let resp = server.post("/analyze").multipart(form).await;
    assert_eq!(resp.status_code(), 200);
    let html = resp.text();
    assert!(html.contains("Fehler bei der KI-Anfrage: Keine KI hat geantwortet"));
    assert!(html.contains("Gemini: quota"));
}
