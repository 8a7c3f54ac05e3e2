// Runtime configuration, read once at startup from the environment.

use crate::core::ai::persona::DEFAULT_PERSONA;
use crate::core::ai::ProviderKind;
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const MAX_HISTORY_LIMIT: u8 = 100;

const DEFAULT_STATUSES: &[&str] = &[
    "Chatting with everyone",
    "Drawing something cute",
    "Reading the channel",
    "!setsuna help",
];

/// Where image generation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageBackend {
    /// Call the Gemini image model from the bot process.
    Inline,
    /// Spawn a helper process per image and parse its stdout.
    Helper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// `owner/name`
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub keys: Vec<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub prefix: String,
    pub data_dir: PathBuf,
    pub default_provider: ProviderKind,
    pub fallback_order: Vec<ProviderKind>,
    pub providers: Vec<ProviderSettings>,
    pub max_history: u8,
    pub context_tokens: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timezone: Tz,
    pub show_reasoning: bool,
    pub statuses: Vec<String>,
    pub status_interval: Duration,
    pub image_backend: ImageBackend,
    /// Helper command line; `None` means "this executable, `genimg` mode".
    pub image_helper: Option<Vec<String>>,
    pub gemini_image_model: String,
    pub gemini_vision_model: String,
    pub tesseract_path: String,
    pub tesseract_lang: String,
    pub mirror: Option<MirrorConfig>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = var("DISCORD_TOKEN").ok_or_else(|| {
            anyhow!("Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.")
        })?;

        let default_provider = match var("SETSUNA_DEFAULT_PROVIDER") {
            Some(raw) => raw
                .parse::<ProviderKind>()
                .with_context(|| format!("Invalid SETSUNA_DEFAULT_PROVIDER '{}'", raw))?,
            None => ProviderKind::Gemini,
        };

        let fallback_order = match var("SETSUNA_FALLBACK_ORDER") {
            Some(raw) => parse_provider_list(&raw).context("Invalid SETSUNA_FALLBACK_ORDER")?,
            None => vec![
                ProviderKind::Gemini,
                ProviderKind::Groq,
                ProviderKind::DeepSeek,
                ProviderKind::ChatGpt,
                ProviderKind::Together,
            ],
        };

        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let prefix = kind.env_prefix();
                let mut keys = var(&format!("{}_API_KEYS", prefix))
                    .map(|raw| parse_key_list(&raw))
                    .unwrap_or_default();
                if keys.is_empty() {
                    keys = var(&format!("{}_API_KEY", prefix))
                        .map(|raw| parse_key_list(&raw))
                        .unwrap_or_default();
                }
                if keys.is_empty() && kind == ProviderKind::Gemini {
                    keys = var("GOOGLE_API_KEY")
                        .map(|raw| parse_key_list(&raw))
                        .unwrap_or_default();
                }
                ProviderSettings {
                    kind,
                    keys,
                    model: var(&format!("{}_MODEL", prefix))
                        .unwrap_or_else(|| kind.default_model().to_string()),
                }
            })
            .collect();

        // Discord returns at most 100 messages per fetch; larger values clamp.
        let max_history = parse_or("SETSUNA_MAX_HISTORY", var("SETSUNA_MAX_HISTORY"), 50u64)?
            .clamp(1, u64::from(MAX_HISTORY_LIMIT)) as u8;

        let system_prompt = match var("SETSUNA_SYSTEM_PROMPT_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read SETSUNA_SYSTEM_PROMPT_FILE at {}", path))?,
            None => var("SETSUNA_SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
        };

        let timezone = match var("SETSUNA_TIMEZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid SETSUNA_TIMEZONE '{}': {}", raw, e))?,
            None => chrono_tz::Asia::Taipei,
        };

        let statuses = var("SETSUNA_STATUSES")
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect());

        let image_backend = match var("SETSUNA_IMAGE_BACKEND").as_deref().map(str::to_lowercase) {
            None => ImageBackend::Inline,
            Some(raw) => match raw.as_str() {
                "inline" => ImageBackend::Inline,
                "helper" => ImageBackend::Helper,
                other => {
                    return Err(anyhow!(
                        "Invalid SETSUNA_IMAGE_BACKEND '{}' (expected 'inline' or 'helper')",
                        other
                    ))
                }
            },
        };

        let mirror = match (var("CHANNEL_MIRROR_REPO"), var("GITHUB_TOKEN")) {
            (Some(repo), Some(token)) => Some(MirrorConfig {
                repo,
                path: var("CHANNEL_MIRROR_PATH").unwrap_or_else(|| "setsuna/channels.json".to_string()),
                branch: var("CHANNEL_MIRROR_BRANCH").unwrap_or_else(|| "main".to_string()),
                token,
            }),
            (Some(_), None) => {
                tracing::warn!("CHANNEL_MIRROR_REPO is set but GITHUB_TOKEN is not; mirror disabled");
                None
            }
            _ => None,
        };

        Ok(Self {
            discord_token,
            prefix: var("SETSUNA_PREFIX").unwrap_or_else(|| "!".to_string()),
            data_dir: PathBuf::from(var("SETSUNA_DATA_DIR").unwrap_or_else(|| "data".to_string())),
            default_provider,
            fallback_order,
            providers,
            max_history,
            context_tokens: parse_or("SETSUNA_CONTEXT_TOKENS", var("SETSUNA_CONTEXT_TOKENS"), 8000usize)?,
            temperature: parse_or("SETSUNA_TEMPERATURE", var("SETSUNA_TEMPERATURE"), 0.7f32)?,
            max_tokens: parse_or("SETSUNA_MAX_TOKENS", var("SETSUNA_MAX_TOKENS"), 1000u32)?,
            system_prompt,
            timezone,
            show_reasoning: parse_or("SETSUNA_SHOW_REASONING", var("SETSUNA_SHOW_REASONING"), false)?,
            statuses,
            status_interval: Duration::from_secs(
                parse_or("SETSUNA_STATUS_INTERVAL_SECS", var("SETSUNA_STATUS_INTERVAL_SECS"), 300u64)?
                    .max(15),
            ),
            image_backend,
            image_helper: var("SETSUNA_IMAGE_HELPER")
                .map(|raw| raw.split_whitespace().map(String::from).collect::<Vec<_>>())
                .filter(|parts| !parts.is_empty()),
            gemini_image_model: var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash-preview-image-generation".to_string()),
            gemini_vision_model: var("GEMINI_VISION_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            tesseract_path: var("TESSERACT_PATH").unwrap_or_else(|| "tesseract".to_string()),
            tesseract_lang: var("TESSERACT_LANG").unwrap_or_else(|| "eng+chi_tra".to_string()),
            mirror,
        })
    }

    pub fn channels_path(&self) -> PathBuf {
        self.data_dir.join("channels.json")
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    pub fn gemini_keys(&self) -> Vec<String> {
        self.provider(ProviderKind::Gemini)
            .map(|p| p.keys.clone())
            .unwrap_or_default()
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn parse_provider_list(raw: &str) -> Result<Vec<ProviderKind>> {
    let mut order = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: ProviderKind = name.parse()?;
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

/// Parses a list of API keys: either a JSON array of strings or a
/// comma/newline separated list. Placeholders such as `YOUR_GROQ_KEY_HERE`
/// and duplicates are dropped; order is preserved.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let candidates: Vec<String> = if raw.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("API key list looks like JSON but does not parse: {}", e);
                Vec::new()
            }
        }
    } else {
        raw.split([',', '\n']).map(String::from).collect()
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|k| k.trim().trim_matches('"').to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| !(k.starts_with("YOUR_") && k.ends_with("_HERE")))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BotConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DISCORD_TOKEN", "t")]).unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.default_provider, ProviderKind::Gemini);
        assert_eq!(config.max_history, 50);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.timezone, chrono_tz::Asia::Taipei);
        assert_eq!(config.image_backend, ImageBackend::Inline);
        assert_eq!(config.channels_path(), PathBuf::from("data").join("channels.json"));
        assert_eq!(config.status_interval, Duration::from_secs(300));
        assert!(config.mirror.is_none());
        assert!(!config.statuses.is_empty());
        assert!(config.providers.iter().all(|p| p.keys.is_empty()));
        assert_eq!(
            config.provider(ProviderKind::Groq).unwrap().model,
            "llama-3.3-70b-versatile"
        );
    }

    #[test]
    fn test_provider_keys_and_overrides() {
        let config = config(&[
            ("DISCORD_TOKEN", "t"),
            ("GROQ_API_KEYS", r#"["gsk_1", "gsk_2", "gsk_1"]"#),
            ("OPENAI_API_KEY", "sk-a, sk-b"),
            ("GOOGLE_API_KEY", "AIza-1"),
            ("DEEPSEEK_MODEL", "deepseek-reasoner"),
            ("SETSUNA_DEFAULT_PROVIDER", "openai"),
            ("SETSUNA_FALLBACK_ORDER", "groq, gemini, groq"),
            ("SETSUNA_MAX_HISTORY", "250"),
        ])
        .unwrap();

        assert_eq!(config.provider(ProviderKind::Groq).unwrap().keys, vec!["gsk_1", "gsk_2"]);
        assert_eq!(config.provider(ProviderKind::ChatGpt).unwrap().keys, vec!["sk-a", "sk-b"]);
        assert_eq!(config.gemini_keys(), vec!["AIza-1"]);
        assert_eq!(config.provider(ProviderKind::DeepSeek).unwrap().model, "deepseek-reasoner");
        assert_eq!(config.default_provider, ProviderKind::ChatGpt);
        assert_eq!(config.fallback_order, vec![ProviderKind::Groq, ProviderKind::Gemini]);
        assert_eq!(config.max_history, MAX_HISTORY_LIMIT);
    }

    #[test]
    fn test_max_history_clamps_large_and_zero_values() {
        let config_with = |raw: &str| config(&[("DISCORD_TOKEN", "t"), ("SETSUNA_MAX_HISTORY", raw)]);
        assert_eq!(config_with("300").unwrap().max_history, MAX_HISTORY_LIMIT);
        assert_eq!(config_with("100000").unwrap().max_history, MAX_HISTORY_LIMIT);
        assert_eq!(config_with("0").unwrap().max_history, 1);
        assert_eq!(config_with("42").unwrap().max_history, 42);
        assert!(config_with("-5").is_err());
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config(&[("DISCORD_TOKEN", "t"), ("SETSUNA_TIMEZONE", "Mars/Olympus")]).unwrap_err();
        assert!(err.to_string().contains("SETSUNA_TIMEZONE"));

        let err = config(&[("DISCORD_TOKEN", "t"), ("SETSUNA_IMAGE_BACKEND", "cloud")]).unwrap_err();
        assert!(err.to_string().contains("SETSUNA_IMAGE_BACKEND"));

        let err = config(&[("DISCORD_TOKEN", "t"), ("SETSUNA_TEMPERATURE", "warm")]).unwrap_err();
        assert!(err.to_string().contains("SETSUNA_TEMPERATURE"));
    }

    #[test]
    fn test_mirror_needs_repo_and_token() {
        let config = config(&[
            ("DISCORD_TOKEN", "t"),
            ("CHANNEL_MIRROR_REPO", "owner/bot-state"),
            ("GITHUB_TOKEN", "ghp_x"),
        ])
        .unwrap();
        let mirror = config.mirror.unwrap();
        assert_eq!(mirror.repo, "owner/bot-state");
        assert_eq!(mirror.path, "setsuna/channels.json");
        assert_eq!(mirror.branch, "main");
    }

    #[test]
    fn test_helper_command_and_statuses() {
        let config = config(&[
            ("DISCORD_TOKEN", "t"),
            ("SETSUNA_IMAGE_BACKEND", "Helper"),
            ("SETSUNA_IMAGE_HELPER", "node genimg.mjs"),
            ("SETSUNA_STATUSES", "one | two ||"),
        ])
        .unwrap();
        assert_eq!(config.image_backend, ImageBackend::Helper);
        assert_eq!(
            config.image_helper,
            Some(vec!["node".to_string(), "genimg.mjs".to_string()])
        );
        assert_eq!(config.statuses, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_key_list_formats() {
        assert_eq!(parse_key_list("a,b\nc"), vec!["a", "b", "c"]);
        assert_eq!(parse_key_list(r#"["x","YOUR_GEMINI_KEY_HERE"," y "]"#), vec!["x", "y"]);
        assert!(parse_key_list("[not json").is_empty());
        assert!(parse_key_list(" , ").is_empty());
    }
}
