use super::image_fetch::fetch_image;
use crate::core::ai::{AiError, KeyRing};
use crate::core::imaging::helper_protocol::extract_data_uri;
use crate::core::imaging::{
    GeneratedImage, ImageAnalyzer, ImageGenerator, ImageRequest, ImagingError, VisionTask,
};
use crate::infra::ai::gemini_client::GeminiOutput;
use crate::infra::ai::GeminiClient;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Appended to plain generation prompts; without it the model often answers
/// in text only.
const QUALITY_REQUIREMENTS: &str = "Strictly follow these requirements:
1. You must produce a complete image, not just a text reply.
2. The image must be high resolution, sharp and rich in detail.
3. Use professional composition and lighting.
4. Keep the style consistent and pleasing.
5. Depict the described content and features as accurately as possible.
6. Use rich colours and appropriate contrast.
7. The image must be in colour unless black and white is explicitly requested.
8. Do not add any text or watermark to the image.";

/// Image generation and vision straight against the Gemini API, sharing the
/// chat provider's key ring.
pub struct GeminiImaging {
    gemini: GeminiClient,
    http: Client,
    keys: Arc<KeyRing>,
    image_model: String,
    vision_model: String,
}

impl GeminiImaging {
    pub fn new(keys: Arc<KeyRing>, image_model: String, vision_model: String) -> Self {
        Self {
            gemini: GeminiClient::new(),
            http: Client::new(),
            keys,
            image_model,
            vision_model,
        }
    }

    fn generation_prompt(request: &ImageRequest) -> String {
        match request.source_image_url {
            Some(_) => format!(
                "Redraw this image in the following style, keeping its subject and composition: {}",
                request.prompt
            ),
            None => format!(
                "Generate a high-quality image of: {}\n\n{}",
                request.prompt, QUALITY_REQUIREMENTS
            ),
        }
    }

    /// Picks the first inline image, or a `data:image/...` URI the model wrote
    /// into its text instead.
    fn image_from_output(output: GeminiOutput) -> Result<GeneratedImage, ImagingError> {
        let caption = Some(output.text.trim().to_string()).filter(|t| !t.is_empty());
        if let Some(image) = output.images.into_iter().next() {
            return Ok(GeneratedImage { image, caption });
        }
        if let Some(image) = caption.as_deref().and_then(extract_data_uri) {
            return Ok(GeneratedImage {
                image,
                caption: None,
            });
        }
        Err(ImagingError::NoImage(
            caption.unwrap_or_else(|| "the model returned no image".to_string()),
        ))
    }
}

#[async_trait]
impl ImageGenerator for GeminiImaging {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImagingError> {
        let source = match &request.source_image_url {
            Some(url) => Some(fetch_image(&self.http, url).await?),
            None => None,
        };
        let prompt = Self::generation_prompt(request);

        let output = self
            .keys
            .with_rotation(|key| {
                let prompt = &prompt;
                let source = source.as_ref();
                async move {
                    self.gemini
                        .generate_image(&key, &self.image_model, prompt, source)
                        .await
                }
            })
            .await?;

        Self::image_from_output(output)
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiImaging {
    async fn analyze(&self, image_url: &str, task: &VisionTask) -> Result<String, ImagingError> {
        let image = fetch_image(&self.http, image_url).await?;
        let prompt = task.prompt();
        let temperature = task.temperature();

        let text = self
            .keys
            .with_rotation(|key| {
                let prompt = &prompt;
                let image = &image;
                async move {
                    self.gemini
                        .analyze_image(&key, &self.vision_model, prompt, image, temperature)
                        .await
                }
            })
            .await
            .map_err(|e| match e {
                AiError::EmptyResponse(_) => ImagingError::NoImage("the vision model returned no text".into()),
                other => ImagingError::Provider(other),
            })?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::imaging::ImageData;

    #[test]
    fn test_generation_prompt_mentions_style_for_transfers() {
        let plain = ImageRequest {
            prompt: "a cat".into(),
            source_image_url: None,
        };
        let prompt = GeminiImaging::generation_prompt(&plain);
        assert!(prompt.starts_with("Generate a high-quality image of: a cat"));
        assert!(prompt.contains("You must produce a complete image, not just a text reply."));

        let transfer = ImageRequest {
            prompt: "watercolor".into(),
            source_image_url: Some("https://cdn/x.png".into()),
        };
        assert!(GeminiImaging::generation_prompt(&transfer).ends_with("style, keeping its subject and composition: watercolor"));
    }

    #[test]
    fn test_image_from_output_prefers_inline_image() {
        let output = GeminiOutput {
            text: "Here you go".into(),
            images: vec![ImageData {
                bytes: vec![1, 2, 3],
                mime_type: "image/png".into(),
            }],
            ..Default::default()
        };
        let image = GeminiImaging::image_from_output(output).unwrap();
        assert_eq!(image.image.bytes, vec![1, 2, 3]);
        assert_eq!(image.caption.as_deref(), Some("Here you go"));
    }

    #[test]
    fn test_image_from_output_falls_back_to_data_uri_in_text() {
        let output = GeminiOutput {
            text: "Sure! data:image/jpeg;base64,iVBORw0KGgo= enjoy".into(),
            ..Default::default()
        };
        let image = GeminiImaging::image_from_output(output).unwrap();
        assert_eq!(image.image.mime_type, "image/jpeg");
        assert!(!image.image.bytes.is_empty());
        assert!(image.caption.is_none());
    }

    #[test]
    fn test_image_from_text_only_output_is_no_image() {
        let output = GeminiOutput {
            text: "I can only describe it in words.".into(),
            ..Default::default()
        };
        assert!(matches!(
            GeminiImaging::image_from_output(output),
            Err(ImagingError::NoImage(reason)) if reason.starts_with("I can only")
        ));
    }

    #[tokio::test]
    async fn test_generate_without_keys_fails_fast() {
        let imaging = GeminiImaging::new(
            Arc::new(KeyRing::new("gemini", vec![])),
            "img".into(),
            "vision".into(),
        );
        let result = imaging
            .generate(&ImageRequest {
                prompt: "a cat".into(),
                source_image_url: None,
            })
            .await;
        assert!(matches!(result, Err(ImagingError::Provider(AiError::NoKeys(_)))));
    }
}
