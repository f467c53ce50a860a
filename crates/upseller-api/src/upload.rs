use crate::error::{ApiError, ApiResult};
use axum::extract::multipart::{Multipart, MultipartError};
use upseller_core::ImageAttachment;

/// Fields of the analyze form
#[derive(Debug, Default)]
pub struct AnalyzeUpload {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

fn upload_error(e: MultipartError) -> ApiError {
    tracing::warn!(error = %e, "Multipart body rejected");
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::Upload("Die Anfrage ist zu groß.".to_string())
    } else {
        ApiError::Upload("Das Formular konnte nicht gelesen werden.".to_string())
    }
}

/// Read `text` and the optional `image` field.
///
/// Browsers submit an empty file part when no file was chosen; that counts
/// as "no image".
pub async fn read_analyze_form(
    mut multipart: Multipart,
    max_image_bytes: usize,
) -> ApiResult<AnalyzeUpload> {
    let mut upload = AnalyzeUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                upload.text = field.text().await.map_err(upload_error)?;
            }
            Some("image") => {
                let declared = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(upload_error)?;
                if data.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
                    continue;
                }
                let image =
                    ImageAttachment::from_upload(data.to_vec(), declared.as_deref(), max_image_bytes)?;
                tracing::debug!(
                    media_type = %image.media_type,
                    bytes = image.data.len(),
                    "Image uploaded"
                );
                upload.image = Some(image);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown form field");
            }
        }
    }

    Ok(upload)
}
