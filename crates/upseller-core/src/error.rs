use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpsellerError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State decoding error: {0}")]
    StateDecode(#[from] base64::DecodeError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

pub type Result<T> = std::result::Result<T, UpsellerError>;
