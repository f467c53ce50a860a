use crate::{handlers, AppState};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Single-provider rewrite with conversation history
        .route("/", get(handlers::optimize_form).post(handlers::optimize))

        // Eight questions, then the council
        .route(
            "/questionnaire",
            get(handlers::questionnaire_start).post(handlers::questionnaire_step),
        )

        // Free text and optional image straight to the council
        .route("/analyze", get(handlers::analyze_form).post(handlers::analyze))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}
