use crate::core::ai::AiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("An image is already being generated in this channel")]
    Busy,
    #[error("Failed to download image: {0}")]
    Download(String),
    #[error(transparent)]
    Provider(#[from] AiError),
    #[error("Image helper failed: {0}")]
    Helper(String),
    #[error("Malformed helper output: {0}")]
    MalformedOutput(String),
    #[error("No image in the response: {0}")]
    NoImage(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// What the user asked to have drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Source picture for style transfer.
    pub source_image_url: Option<String>,
}

/// Raw image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    /// File extension matching the MIME type, for Discord attachments.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: ImageData,
    /// Text the model produced alongside the picture, if any.
    pub caption: Option<String>,
}

/// What to ask a vision model about an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionTask {
    Ocr,
    Describe,
    Analyze,
    Ask(String),
}

impl VisionTask {
    pub fn prompt(&self) -> String {
        match self {
            VisionTask::Ocr => "Transcribe every piece of text in this image, in any language \
                 (Chinese, English or others). Keep the original line breaks and paragraph layout. \
                 If the image contains no text, answer exactly: 圖片中沒有可識別的文字"
                .to_string(),
            VisionTask::Describe => "Describe this image in detail: the main objects and people, \
                 the scene and background, colours and lighting, and the overall mood and style. \
                 If there is any text, quote it. Answer in Traditional Chinese."
                .to_string(),
            VisionTask::Analyze => "Analyse this image: what kind of image it is (photo, \
                 illustration, screenshot...), its main content and elements, its likely purpose \
                 or context, and any noteworthy details. If it is a table, summarise the table. \
                 Answer in Traditional Chinese."
                .to_string(),
            VisionTask::Ask(question) => format!(
                "Answer the following question based on this image: {}",
                question.trim()
            ),
        }
    }

    /// OCR wants near-deterministic output; descriptions can be livelier.
    pub fn temperature(&self) -> f32 {
        match self {
            VisionTask::Ocr => 0.1,
            _ => 0.4,
        }
    }
}
