// Image helper wire format.
//
// The helper process prints exactly one JSON object on stdout:
//
//   {"success":true,"text":"...","imageData":"<base64>","mimeType":"image/png","error":""}
//
// Large payloads are written in 64 KiB chunks; `###JSON_START###` /
// `###JSON_END###` markers and progress lines go to stderr, but older helpers
// printed them on stdout as well, so the parser tolerates both.

use super::imaging_models::{GeneratedImage, ImageData, ImagingError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const JSON_START_MARKER: &str = "###JSON_START###";
pub const JSON_END_MARKER: &str = "###JSON_END###";
pub const CHUNK_SIZE: usize = 64 * 1024;

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/(jpeg|png|gif|webp);base64,([A-Za-z0-9+/=]+)").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelperOutput {
    pub success: bool,
    pub text: Option<String>,
    #[serde(alias = "image_data")]
    pub image_data: Option<String>,
    #[serde(alias = "mime_type")]
    pub mime_type: Option<String>,
    pub error: Option<String>,
}

impl HelperOutput {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn from_image(generated: &GeneratedImage) -> Self {
        Self {
            success: true,
            text: generated.caption.clone(),
            image_data: Some(STANDARD.encode(&generated.image.bytes)),
            mime_type: Some(generated.image.mime_type.clone()),
            error: None,
        }
    }

    /// Decodes the image, falling back to a data URI embedded in the text.
    pub fn into_image(self) -> Result<GeneratedImage, ImagingError> {
        let caption = non_empty(self.text);

        if let Some(data) = non_empty(self.image_data) {
            let bytes = STANDARD
                .decode(data.trim())
                .map_err(|e| ImagingError::MalformedOutput(format!("bad base64 image: {}", e)))?;
            let mime_type = non_empty(self.mime_type).unwrap_or_else(|| "image/png".to_string());
            return Ok(GeneratedImage {
                image: ImageData { bytes, mime_type },
                caption,
            });
        }

        if let Some(text) = caption.as_deref() {
            if let Some(image) = extract_data_uri(text) {
                return Ok(GeneratedImage {
                    image,
                    caption: None,
                });
            }
        }

        let reason = non_empty(self.error)
            .or(caption)
            .unwrap_or_else(|| "helper returned no image data".to_string());
        Err(ImagingError::NoImage(reason))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pulls a `data:image/...;base64,...` URI out of free text.
pub fn extract_data_uri(text: &str) -> Option<ImageData> {
    let caps = DATA_URI.captures(text)?;
    let bytes = STANDARD.decode(&caps[2]).ok()?;
    Some(ImageData {
        bytes,
        mime_type: format!("image/{}", &caps[1]),
    })
}

/// Parses the helper's stdout into a `HelperOutput`.
pub fn parse_helper_output(stdout: &str) -> Result<HelperOutput, ImagingError> {
    let mut body = stdout;
    if let Some(start) = body.find(JSON_START_MARKER) {
        body = &body[start + JSON_START_MARKER.len()..];
    }
    if let Some(end) = body.find(JSON_END_MARKER) {
        body = &body[..end];
    }

    let start = body
        .find('{')
        .ok_or_else(|| ImagingError::MalformedOutput("no JSON object in helper output".into()))?;
    let end = body
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ImagingError::MalformedOutput("unterminated JSON object".into()))?;

    serde_json::from_str(&body[start..=end])
        .map_err(|e| ImagingError::MalformedOutput(e.to_string()))
}

/// Splits `payload` into pieces of at most `max_bytes`, never inside a character.
pub fn chunk_on_char_boundaries(payload: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(4);
    let mut chunks = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let mut cut = rest.len().min(max_bytes);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    chunks
}

/// Writes `payload` to `writer` chunk by chunk, flushing and pausing between
/// chunks so a slow pipe reader keeps up. Returns the number of chunks.
pub async fn write_chunked<W>(
    writer: &mut W,
    payload: &str,
    chunk_size: usize,
    delay: Duration,
) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let chunks = chunk_on_char_boundaries(payload, chunk_size);
    let total = chunks.len();
    for (idx, chunk) in chunks.into_iter().enumerate() {
        writer.write_all(chunk.as_bytes()).await?;
        writer.flush().await?;
        if idx + 1 < total {
            tracing::debug!("Wrote chunk {}/{}", idx + 1, total);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
    Ok(total)
}
