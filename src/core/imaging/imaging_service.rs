use super::imaging_models::{GeneratedImage, ImageRequest, ImagingError, VisionTask};
use super::jobs::InFlight;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Produces a new image from a prompt (optionally restyling a source image).
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImagingError>;
}

/// Answers questions about an image with a vision model.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str, task: &VisionTask) -> Result<String, ImagingError>;
}

/// Extracts text from an image without a language model.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_url: &str) -> Result<String, ImagingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    /// Vision model transcription.
    Gemini,
    /// Local Tesseract install.
    Tesseract,
}

pub struct ImagingService {
    generator: Arc<dyn ImageGenerator>,
    analyzer: Option<Arc<dyn ImageAnalyzer>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    jobs: InFlight,
    describe_delay: Duration,
}

impl ImagingService {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        analyzer: Option<Arc<dyn ImageAnalyzer>>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self {
            generator,
            analyzer,
            ocr,
            jobs: InFlight::new(),
            describe_delay: Duration::from_secs(1),
        }
    }

    pub fn can_analyze(&self) -> bool {
        self.analyzer.is_some()
    }

    pub fn is_busy(&self, channel_id: u64) -> bool {
        self.jobs.is_busy(channel_id)
    }

    /// Generates an image for `channel_id`. Only one generation per channel
    /// runs at a time; a concurrent request gets `ImagingError::Busy`.
    pub async fn generate(
        &self,
        channel_id: u64,
        request: ImageRequest,
    ) -> Result<GeneratedImage, ImagingError> {
        let _ticket = self.jobs.try_begin(channel_id).ok_or(ImagingError::Busy)?;

        tracing::info!(
            channel_id,
            style_transfer = request.source_image_url.is_some(),
            "Generating image: {}",
            request.prompt
        );
        let started = std::time::Instant::now();
        let result = self.generator.generate(&request).await;

        match &result {
            Ok(image) => tracing::info!(
                channel_id,
                bytes = image.image.bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Image generated"
            ),
            Err(e) => tracing::warn!(channel_id, "Image generation failed: {}", e),
        }
        result
    }

    pub async fn analyze(&self, image_url: &str, task: &VisionTask) -> Result<String, ImagingError> {
        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or(ImagingError::NotConfigured("Image analysis"))?;
        analyzer.analyze(image_url, task).await
    }

    /// Describes several images one after another. Images that fail are
    /// skipped; the result keeps the input order of the ones that worked.
    pub async fn describe_all(&self, image_urls: &[String]) -> Vec<(String, String)> {
        let mut descriptions = Vec::new();
        for (idx, url) in image_urls.iter().enumerate() {
            if idx > 0 && !self.describe_delay.is_zero() {
                tokio::time::sleep(self.describe_delay).await;
            }
            match self.analyze(url, &VisionTask::Describe).await {
                Ok(text) => descriptions.push((url.clone(), text)),
                Err(e) => tracing::warn!("Failed to describe image {}: {}", url, e),
            }
        }
        descriptions
    }

    pub async fn ocr(&self, image_url: &str, backend: OcrBackend) -> Result<String, ImagingError> {
        match backend {
            OcrBackend::Gemini => self.analyze(image_url, &VisionTask::Ocr).await,
            OcrBackend::Tesseract => {
                let engine = self
                    .ocr
                    .as_ref()
                    .ok_or(ImagingError::NotConfigured("Tesseract OCR"))?;
                engine.recognize(image_url).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::imaging::imaging_models::ImageData;
    use tokio::sync::Notify;

    struct GatedGenerator {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ImageGenerator for GatedGenerator {
        async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImagingError> {
            self.gate.notified().await;
            Ok(GeneratedImage {
                image: ImageData {
                    bytes: request.prompt.as_bytes().to_vec(),
                    mime_type: "image/png".into(),
                },
                caption: None,
            })
        }
    }

    struct EchoAnalyzer;

    #[async_trait]
    impl ImageAnalyzer for EchoAnalyzer {
        async fn analyze(&self, image_url: &str, task: &VisionTask) -> Result<String, ImagingError> {
            if image_url.contains("broken") {
                return Err(ImagingError::Download("404".into()));
            }
            Ok(format!("{:?}:{}", task, image_url))
        }
    }

    fn service(gate: Arc<Notify>) -> ImagingService {
        let mut service = ImagingService::new(
            Arc::new(GatedGenerator { gate }),
            Some(Arc::new(EchoAnalyzer)),
            None,
        );
        service.describe_delay = Duration::ZERO;
        service
    }

    fn request(prompt: &str) -> ImageRequest {
        ImageRequest {
            prompt: prompt.into(),
            source_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_generation_in_same_channel_is_busy() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(service(gate.clone()));

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.generate(1, request("cat")).await })
        };
        while !service.is_busy(1) {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            service.generate(1, request("dog")).await,
            Err(ImagingError::Busy)
        ));

        gate.notify_one();
        let image = first.await.unwrap().unwrap();
        assert_eq!(image.image.bytes, b"cat");
        assert!(!service.is_busy(1));
    }

    #[tokio::test]
    async fn test_describe_all_skips_failures() {
        let service = service(Arc::new(Notify::new()));
        let urls = vec![
            "https://cdn/a.png".to_string(),
            "https://cdn/broken.png".to_string(),
            "https://cdn/b.png".to_string(),
        ];
        let descriptions = service.describe_all(&urls).await;

        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions[0].0, "https://cdn/a.png");
        assert_eq!(descriptions[1].1, "Describe:https://cdn/b.png");
    }

    #[tokio::test]
    async fn test_ocr_backends() {
        let service = service(Arc::new(Notify::new()));
        assert_eq!(
            service.ocr("https://cdn/t.png", OcrBackend::Gemini).await.unwrap(),
            "Ocr:https://cdn/t.png"
        );
        assert!(matches!(
            service.ocr("https://cdn/t.png", OcrBackend::Tesseract).await,
            Err(ImagingError::NotConfigured(_))
        ));
    }
}
