use crate::error::{Result, UpsellerError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Image uploaded alongside a product description
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl ImageAttachment {
    /// Validate raw upload bytes.
    ///
    /// The media type is sniffed from the content; the declared type from the
    /// browser is only used for the log line when the two disagree.
    pub fn from_upload(data: Vec<u8>, declared_type: Option<&str>, max_bytes: usize) -> Result<Self> {
        if data.is_empty() {
            return Err(UpsellerError::Upload("Die Bilddatei ist leer.".to_string()));
        }
        if data.len() > max_bytes {
            return Err(UpsellerError::Upload(format!(
                "Das Bild ist zu groß ({} KB, erlaubt sind {} KB).",
                data.len() / 1024,
                max_bytes / 1024
            )));
        }

        let media_type = sniff_media_type(&data).ok_or_else(|| {
            UpsellerError::Upload(
                "Unbekanntes Bildformat. Erlaubt sind PNG, JPEG, GIF und WebP.".to_string(),
            )
        })?;

        if let Some(declared) = declared_type {
            if !declared.eq_ignore_ascii_case(media_type) {
                tracing::debug!(
                    declared = %declared,
                    sniffed = %media_type,
                    "Declared image type differs from content"
                );
            }
        }

        Ok(Self {
            media_type: media_type.to_string(),
            data,
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }
}

/// Detect a supported image type from its magic bytes
pub fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
