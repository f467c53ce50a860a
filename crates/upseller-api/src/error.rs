use crate::page;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use upseller_core::UpsellerError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Hidden state that did not decode or validate
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<UpsellerError> for ApiError {
    fn from(err: UpsellerError) -> Self {
        match err {
            UpsellerError::Validation(msg) => ApiError::BadRequest(msg),
            UpsellerError::Upload(msg) => ApiError::Upload(msg),
            UpsellerError::InvalidState(_)
            | UpsellerError::StateDecode(_)
            | UpsellerError::Serialization(_) => ApiError::InvalidState(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            ApiError::InvalidState(detail) => {
                tracing::warn!(detail = %detail, "Rejected client state");
                (
                    StatusCode::BAD_REQUEST,
                    "Ungültiger Fortschritt",
                    "Die übermittelten Daten sind beschädigt oder wurden verändert. Bitte starte neu."
                        .to_string(),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Ungültige Eingabe", msg.clone()),
            ApiError::Upload(msg) => (StatusCode::BAD_REQUEST, "Upload fehlgeschlagen", msg.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Interner Fehler",
                    "Da ist etwas schiefgelaufen. Bitte versuche es erneut.".to_string(),
                )
            }
        };

        (status, Html(page::error_page(title, &message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
