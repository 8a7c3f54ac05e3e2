// Image generation through a helper process.
//
// The helper is given `--api-key=<key> [--image-url=<url>] <prompt>` and
// prints one `HelperOutput` JSON object on stdout. By default the helper is
// this very binary in `genimg` mode, but any program speaking the same
// protocol works.

use crate::core::ai::{AiError, KeyRing};
use crate::core::imaging::helper_protocol::parse_helper_output;
use crate::core::imaging::{GeneratedImage, ImageGenerator, ImageRequest, ImagingError};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

pub const HELPER_TIMEOUT: Duration = Duration::from_secs(120);

pub struct HelperProcessGenerator {
    program: String,
    base_args: Vec<String>,
    keys: Arc<KeyRing>,
    timeout: Duration,
}

impl HelperProcessGenerator {
    /// `command` is the program followed by its fixed arguments.
    pub fn new(command: Vec<String>, keys: Arc<KeyRing>) -> Result<Self, ImagingError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or(ImagingError::NotConfigured("Image helper command"))?;
        Ok(Self {
            program,
            base_args: parts.collect(),
            keys,
            timeout: HELPER_TIMEOUT,
        })
    }

    fn args(&self, api_key: Option<&str>, request: &ImageRequest) -> Vec<String> {
        let mut args = self.base_args.clone();
        if let Some(key) = api_key {
            args.push(format!("--api-key={}", key));
        }
        if let Some(url) = &request.source_image_url {
            args.push(format!("--image-url={}", url));
        }
        args.push(request.prompt.clone());
        args
    }

    async fn run(
        &self,
        api_key: Option<&str>,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, ImagingError> {
        let child = Command::new(&self.program)
            .args(self.args(api_key, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ImagingError::Helper(format!("failed to start {}: {}", self.program, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ImagingError::Helper(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| ImagingError::Helper(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(target: "setsuna::helper", "{}", line);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(
            bytes = stdout.len(),
            status = ?output.status.code(),
            "Image helper finished"
        );

        match parse_helper_output(&stdout) {
            Ok(parsed) => parsed.into_image(),
            // No JSON at all: the exit status and stderr are all we have.
            Err(_) if !output.status.success() => Err(ImagingError::Helper(format!(
                "exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or_default()
            ))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ImageGenerator for HelperProcessGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImagingError> {
        if self.keys.is_empty() {
            // The helper may bring its own credentials.
            return self.run(None, request).await;
        }

        // Key problems are surfaced as AiError so the ring rotates; everything
        // else is passed through untouched as the inner result.
        self.keys
            .with_rotation(|key| async move {
                match self.run(Some(&key), request).await {
                    Err(ImagingError::NoImage(reason))
                        if AiError::Remote(reason.clone()).is_key_related() =>
                    {
                        Err(AiError::Remote(reason))
                    }
                    other => Ok(other),
                }
            })
            .await?
    }
}
