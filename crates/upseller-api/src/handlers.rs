use crate::error::{ApiError, ApiResult};
use crate::page::{self, OptimizeView};
use crate::upload;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};
use upseller_ai::{prompts, AnalysisRequest, Council, GenerationConfig, Message};
use upseller_core::{
    client_state, ConversationHistory, ProviderKind, QuestionnaireState, Stage, UpsellerError,
};

/// Longest free text accepted by the optimize and analyze forms, in characters
pub const MAX_INPUT_CHARS: usize = 10_000;

type Page = (StatusCode, Html<String>);

fn ok(html: String) -> Page {
    (StatusCode::OK, Html(html))
}

fn bad_request(html: String) -> Page {
    (StatusCode::BAD_REQUEST, Html(html))
}

fn encode_state<T: serde::Serialize>(value: &T) -> ApiResult<String> {
    client_state::encode(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Trimmed user text, or the German message explaining why it was rejected
fn validate_input(text: &str) -> Result<&str, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("Bitte gib einen Text ein.".to_string());
    }
    if trimmed.chars().count() > MAX_INPUT_CHARS {
        return Err(format!(
            "Der Text ist zu lang (maximal {} Zeichen).",
            MAX_INPUT_CHARS
        ));
    }
    Ok(trimmed)
}

// Optimize

#[derive(Debug, Deserialize)]
pub struct OptimizeForm {
    #[serde(default)]
    pub text: String,
    pub history: Option<String>,
    pub reset: Option<String>,
}

fn render_optimize(
    input: &str,
    history: &mut ConversationHistory,
    result_html: &str,
    notice: Option<&str>,
) -> ApiResult<String> {
    // Every token handed out must pass the size check of the next decode
    let history_token = if history.is_empty() {
        String::new()
    } else {
        history
            .encode_within(client_state::MAX_TOKEN_BYTES)
            .map_err(|e| ApiError::Internal(e.to_string()))?
    };
    Ok(page::optimize_page(&OptimizeView {
        input,
        history_token: &history_token,
        turns: history.len(),
        result_html,
        notice,
    }))
}

pub async fn optimize_form() -> ApiResult<Page> {
    Ok(ok(render_optimize("", &mut ConversationHistory::new(), "", None)?))
}

#[instrument(skip_all)]
pub async fn optimize(
    State(state): State<AppState>,
    Form(form): Form<OptimizeForm>,
) -> ApiResult<Page> {
    if form.reset.is_some() {
        return optimize_form().await;
    }

    let mut history: ConversationHistory =
        client_state::decode_optional(form.history.as_deref())?.unwrap_or_default();

    let text = match validate_input(&form.text) {
        Ok(text) => text,
        Err(message) => {
            return Ok(bad_request(render_optimize(
                &form.text,
                &mut history,
                "",
                Some(&message),
            )?))
        }
    };

    let settings = &state.config.optimizer;
    history.trim_to(settings.max_history_turns);

    let provider = match &state.optimizer {
        Ok(provider) => provider,
        Err(setup_error) => {
            let result = page::ai_error_box(setup_error);
            return Ok(ok(render_optimize(text, &mut history, &result, None)?));
        }
    };

    let prompt = prompts::optimizer_user_prompt(text, !history.is_empty());
    let mut messages = vec![Message::system(prompts::OPTIMIZER_SYSTEM_PROMPT)];
    messages.extend(Message::from_history(&history));
    messages.push(Message::user(prompt.clone()));

    info!(
        provider = provider.provider_name(),
        turns = history.len(),
        chars = text.chars().count(),
        "Optimizing text"
    );

    let config = GenerationConfig::new(settings.temperature, settings.max_tokens);
    // The input stays in the form only when the call failed
    let (input, result_html) = match provider.generate_chat(&messages, &config).await {
        Ok(response) => {
            history.push_user(prompt);
            history.push_assistant(response.content.clone());
            history.trim_to(settings.max_history_turns);
            ("", page::answer_box(&response.content))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Optimizer call failed");
            (text, page::ai_error_box(&e.to_string()))
        }
    };

    Ok(ok(render_optimize(input, &mut history, &result_html, None)?))
}

// Questionnaire

#[derive(Debug, Deserialize)]
pub struct QuestionnaireForm {
    pub state: Option<String>,
    #[serde(default)]
    pub answer: String,
    pub restart: Option<String>,
}

fn render_question(state: &QuestionnaireState, answer: &str, notice: Option<&str>) -> ApiResult<String> {
    match state.stage() {
        Stage::Asking(question) => Ok(page::questionnaire_page(
            question,
            &encode_state(state)?,
            answer,
            notice,
        )),
        Stage::Analysis => Err(ApiError::Internal(
            "completed questionnaire rendered as question".to_string(),
        )),
    }
}

pub async fn questionnaire_start() -> ApiResult<Page> {
    Ok(ok(render_question(&QuestionnaireState::new(), "", None)?))
}

#[instrument(skip_all)]
pub async fn questionnaire_step(
    State(app): State<AppState>,
    Form(form): Form<QuestionnaireForm>,
) -> ApiResult<Page> {
    if form.restart.is_some() {
        return questionnaire_start().await;
    }

    let mut state: QuestionnaireState =
        client_state::decode_optional(form.state.as_deref())?.unwrap_or_default();
    state.validate()?;

    // A completed state comes back when the user re-runs the analysis
    if !state.is_complete() {
        match state.answer(&form.answer) {
            Ok(Stage::Asking(_)) => return Ok(ok(render_question(&state, "", None)?)),
            Ok(Stage::Analysis) => {}
            Err(UpsellerError::Validation(message)) => {
                return Ok(bad_request(render_question(
                    &state,
                    &form.answer,
                    Some(&message),
                )?))
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Questionnaire complete, running analysis");
    let request = AnalysisRequest::new(prompts::questionnaire_brief(&state));
    let result_html = run_council(&app, &request).await;

    Ok(ok(page::questionnaire_result_page(
        &state,
        &encode_state(&state)?,
        &result_html,
    )))
}

// Analyze

pub async fn analyze_form() -> Page {
    ok(page::analyze_page("", "", None))
}

#[instrument(skip_all)]
pub async fn analyze(State(app): State<AppState>, multipart: Multipart) -> ApiResult<Page> {
    let form = upload::read_analyze_form(multipart, app.config.upload.max_image_bytes).await?;

    let text = match validate_input(&form.text) {
        Ok(text) => text,
        Err(message) => {
            return Ok(bad_request(page::analyze_page(
                &form.text,
                "",
                Some(&message),
            )))
        }
    };

    let request = AnalysisRequest::new(text).with_image(form.image);
    let result_html = run_council(&app, &request).await;

    Ok(ok(page::analyze_page(text, &result_html, None)))
}

/// Run the council and render its outcome; failures become an error box
async fn run_council(app: &AppState, request: &AnalysisRequest) -> String {
    let council: &Arc<Council> = match &app.council {
        Ok(council) => council,
        Err(setup_error) => return page::ai_error_box(setup_error),
    };

    match council.run(request).await {
        Ok(report) => page::council_result(&report),
        Err(e) => page::ai_error_box(&e.to_string()),
    }
}

// Health

pub async fn health(State(app): State<AppState>) -> Json<Value> {
    let configured: Vec<&str> = ProviderKind::ALL
        .iter()
        .filter(|k| app.config.use_mock || app.config.providers.get(**k).is_usable())
        .map(|k| k.as_str())
        .collect();

    let optimizer = app.optimizer.as_ref().ok().map(|p| {
        json!({
            "provider": p.provider_name(),
            "model": p.model_name(),
        })
    });

    let council = app.council.as_ref().ok().map(|c| {
        let members: Vec<Value> = c
            .members()
            .iter()
            .map(|m| {
                json!({
                    "label": m.label,
                    "provider": m.provider.provider_name(),
                    "model": m.provider.model_name(),
                    "vision": m.provider.characteristics().supports_vision,
                })
            })
            .collect();
        json!({
            "members": members,
            "meta_provider": c.meta_member().label,
            "parallel": c.settings().parallel,
        })
    });

    let status = if app.optimizer.is_ok() && app.council.is_ok() {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "mock": app.config.use_mock,
        "configured_providers": configured,
        "optimizer": optimizer,
        "council": council,
    }))
}
