use super::image_fetch::fetch_image;
use super::ocr_preprocess::preprocess_for_ocr;
use crate::core::imaging::{ImagingError, OcrEngine};
use async_trait::async_trait;
use reqwest::Client;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// OCR through the `tesseract` command-line tool.
pub struct TesseractOcr {
    http: Client,
    binary: String,
    lang: String,
}

impl TesseractOcr {
    pub fn new(binary: String, lang: String) -> Self {
        Self {
            http: Client::new(),
            binary,
            lang,
        }
    }

    fn args(&self) -> Vec<String> {
        // Page segmentation mode 1: automatic, with orientation detection.
        ["stdin", "stdout", "-l", self.lang.as_str(), "--psm", "1"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Runs tesseract over raw image bytes.
    pub async fn recognize_bytes(&self, bytes: &[u8]) -> Result<String, ImagingError> {
        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ImagingError::Ocr(format!("failed to start {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(bytes)
                .await
                .map_err(|e| ImagingError::Ocr(e.to_string()))?;
        }

        let output = tokio::time::timeout(OCR_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| ImagingError::Ocr("tesseract timed out".into()))?
            .map_err(|e| ImagingError::Ocr(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImagingError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Preprocessed PNG, or the original bytes when the image can't be decoded.
async fn prepare(raw: Vec<u8>) -> Vec<u8> {
    let input = raw.clone();
    match tokio::task::spawn_blocking(move || preprocess_for_ocr(&input)).await {
        Ok(Ok(processed)) => processed,
        Ok(Err(e)) => {
            tracing::warn!("OCR preprocessing failed, using the original image: {}", e);
            raw
        }
        Err(e) => {
            tracing::warn!("OCR preprocessing task failed: {}", e);
            raw
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image_url: &str) -> Result<String, ImagingError> {
        let image = fetch_image(&self.http, image_url).await?;
        let bytes = prepare(image.bytes).await;
        let text = self.recognize_bytes(&bytes).await?;
        tracing::debug!(chars = text.chars().count(), "Tesseract finished");
        Ok(text)
    }
}
