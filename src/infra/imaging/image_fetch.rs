use crate::core::imaging::{ImageData, ImagingError};
use reqwest::Client;

/// Discord attachments top out well below this.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Downloads an image, taking the MIME type from the response headers.
pub async fn fetch_image(http: &Client, url: &str) -> Result<ImageData, ImagingError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ImagingError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImagingError::Download(format!("{} returned {}", url, status)));
    }

    if let Some(length) = response.content_length() {
        if length as usize > MAX_IMAGE_BYTES {
            return Err(ImagingError::Download(format!(
                "image is {} bytes, limit is {}",
                length, MAX_IMAGE_BYTES
            )));
        }
    }

    let mime_type = mime_from_header(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImagingError::Download(e.to_string()))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImagingError::Download(format!(
            "image is {} bytes, limit is {}",
            bytes.len(),
            MAX_IMAGE_BYTES
        )));
    }

    tracing::debug!(url, bytes = bytes.len(), mime = %mime_type, "Downloaded image");
    Ok(ImageData {
        bytes: bytes.to_vec(),
        mime_type,
    })
}

fn mime_from_header(header: Option<&str>) -> String {
    header
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| "image/jpeg".to_string())
}
