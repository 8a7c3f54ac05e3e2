// Helper mode: `setsuna genimg [--api-key=K] [--image-url=U] <prompt...>`
//
// Generates one image and prints a `HelperOutput` JSON object on stdout. All
// logging, progress and the start/end markers go to stderr so a parent
// process can read stdout as pure JSON.

use crate::config::parse_key_list;
use crate::core::ai::KeyRing;
use crate::core::imaging::helper_protocol::{
    write_chunked, HelperOutput, CHUNK_SIZE, JSON_END_MARKER, JSON_START_MARKER,
};
use crate::core::imaging::{ImageGenerator, ImageRequest};
use crate::infra::imaging::GeminiImaging;
use std::sync::Arc;
use std::time::Duration;

const CHUNK_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct HelperArgs {
    pub api_key: Option<String>,
    pub image_url: Option<String>,
    pub prompt: String,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> HelperArgs {
    let mut parsed = HelperArgs::default();
    let mut words = Vec::new();
    for arg in args {
        if let Some(key) = arg.strip_prefix("--api-key=") {
            parsed.api_key = Some(key.to_string()).filter(|k| !k.is_empty());
        } else if let Some(url) = arg.strip_prefix("--image-url=") {
            parsed.image_url = Some(url.to_string()).filter(|u| !u.is_empty());
        } else {
            words.push(arg);
        }
    }
    parsed.prompt = words.join(" ").trim().to_string();
    parsed
}

fn env_keys() -> Vec<String> {
    ["GEMINI_API_KEYS", "GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|raw| parse_key_list(&raw))
        .find(|keys| !keys.is_empty())
        .unwrap_or_default()
}

async fn generate(args: HelperArgs) -> HelperOutput {
    if args.prompt.is_empty() {
        return HelperOutput::failure("No prompt given. Usage: genimg [--api-key=KEY] [--image-url=URL] <prompt>");
    }

    let keys = match args.api_key {
        Some(key) => vec![key],
        None => env_keys(),
    };
    if keys.is_empty() {
        return HelperOutput::failure("No Gemini API key: pass --api-key or set GEMINI_API_KEY");
    }

    let model = std::env::var("GEMINI_IMAGE_MODEL")
        .unwrap_or_else(|_| "gemini-2.0-flash-preview-image-generation".to_string());
    let vision_model =
        std::env::var("GEMINI_VISION_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    let imaging = GeminiImaging::new(Arc::new(KeyRing::new("gemini", keys)), model, vision_model);

    let request = ImageRequest {
        prompt: args.prompt,
        source_image_url: args.image_url,
    };
    tracing::info!(style_transfer = request.source_image_url.is_some(), "Generating image: {}", request.prompt);

    match imaging.generate(&request).await {
        Ok(image) => HelperOutput::from_image(&image),
        Err(e) => HelperOutput::failure(e.to_string()),
    }
}

/// Runs helper mode and returns the process exit code.
pub async fn run(args: Vec<String>) -> i32 {
    let output = generate(parse_args(args)).await;
    let success = output.success;

    let payload = match serde_json::to_string(&output) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize helper output: {}", e);
            return 1;
        }
    };

    eprintln!("{}", JSON_START_MARKER);
    let mut stdout = tokio::io::stdout();
    match write_chunked(&mut stdout, &payload, CHUNK_SIZE, CHUNK_DELAY).await {
        Ok(chunks) => eprintln!("Wrote {} bytes in {} chunk(s)", payload.len(), chunks),
        Err(e) => {
            eprintln!("Failed to write output: {}", e);
            return 1;
        }
    }
    eprintln!("{}", JSON_END_MARKER);

    if success {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&[
            "--api-key=AIza123",
            "a",
            "--image-url=https://cdn/x.png",
            "cat",
            "in the rain",
        ]));
        assert_eq!(
            parsed,
            HelperArgs {
                api_key: Some("AIza123".into()),
                image_url: Some("https://cdn/x.png".into()),
                prompt: "a cat in the rain".into(),
            }
        );
    }

    #[test]
    fn test_empty_flags_are_ignored() {
        let parsed = parse_args(args(&["--api-key=", "hi"]));
        assert!(parsed.api_key.is_none());
        assert_eq!(parsed.prompt, "hi");
    }

    #[tokio::test]
    async fn test_missing_prompt_yields_error_json() {
        let output = generate(parse_args(args(&["--api-key=k"]))).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("No prompt"));
    }
}
