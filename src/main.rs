// Setsuna: a Discord chat bot that relays channel conversations to one of
// several LLM providers and draws pictures on request.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (HTTP APIs, files, processes)
// - `discord/` = Discord-specific adapters (commands, events)
//
// The same binary doubles as the image helper: `setsuna genimg <prompt>`
// generates one picture and prints it as JSON on stdout.

#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;
mod genimg;

use crate::config::{BotConfig, ImageBackend};
use crate::core::ai::{AiProvider, AiService, ChatSettings, KeyRing, ProviderKind};
use crate::core::channels::ChannelService;
use crate::core::imaging::{ImageAnalyzer, ImageGenerator, ImagingService, OcrEngine};
use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use crate::infra::ai::{GeminiClient, OpenAiCompatClient};
use crate::infra::channels::{GithubMirror, JsonChannelStore};
use crate::infra::imaging::{GeminiImaging, HelperProcessGenerator, TesseractOcr};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("genimg") {
        // stdout carries the JSON payload, so logs go to stderr.
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        dotenv::dotenv().ok();
        std::process::exit(genimg::run(args.collect()).await);
    }

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = Arc::new(BotConfig::from_env()?);

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.data_dir.display())
    })?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let mut ai_service = AiService::new(
        config.system_prompt.clone(),
        ChatSettings {
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            top_p: None,
            fallback_order: config.fallback_order.clone(),
            timezone: config.timezone,
        },
    );

    // Chat and imaging share one Gemini ring so a rejected key is skipped by both.
    let gemini_keys = Arc::new(KeyRing::new("gemini", config.gemini_keys()));
    for kind in ProviderKind::ALL {
        let Some(settings) = config.provider(kind) else {
            continue;
        };
        let provider: Arc<dyn AiProvider> = match kind {
            ProviderKind::Gemini => Arc::new(GeminiClient::new()),
            kind => Arc::new(OpenAiCompatClient::new(kind)?),
        };
        let keys = match kind {
            ProviderKind::Gemini => Arc::clone(&gemini_keys),
            kind => Arc::new(KeyRing::new(kind.id(), settings.keys.clone())),
        };
        if keys.is_empty() {
            tracing::info!(provider = %kind, "No API keys configured; provider disabled");
        }
        ai_service.register(provider, keys, settings.model.clone());
    }
    let ai_service = Arc::new(ai_service);

    let mut channel_store = JsonChannelStore::new(config.channels_path())?;
    if let Some(mirror) = &config.mirror {
        let github = GithubMirror::new(
            mirror.repo.clone(),
            mirror.path.clone(),
            mirror.branch.clone(),
            &mirror.token,
        )?;
        channel_store = channel_store.with_mirror(Arc::new(github));
        match channel_store.restore_from_mirror().await {
            Ok(count) => tracing::info!(channels = count, "Restored channel configs from mirror"),
            Err(e) => tracing::warn!("Failed to restore channel configs from mirror: {}", e),
        }
    }
    let channel_service = Arc::new(ChannelService::new(channel_store));

    let gemini_imaging = Arc::new(GeminiImaging::new(
        Arc::clone(&gemini_keys),
        config.gemini_image_model.clone(),
        config.gemini_vision_model.clone(),
    ));
    let generator: Arc<dyn ImageGenerator> = match config.image_backend {
        ImageBackend::Inline => gemini_imaging.clone(),
        ImageBackend::Helper => {
            let command = match &config.image_helper {
                Some(command) => command.clone(),
                None => {
                    let exe = std::env::current_exe()
                        .context("Failed to locate the current executable for the image helper")?;
                    vec![exe.to_string_lossy().into_owned(), "genimg".to_string()]
                }
            };
            tracing::info!(command = ?command, "Using image helper process");
            Arc::new(HelperProcessGenerator::new(command, Arc::clone(&gemini_keys))?)
        }
    };
    let analyzer: Option<Arc<dyn ImageAnalyzer>> = if gemini_keys.is_empty() {
        tracing::warn!("No Gemini keys configured; image descriptions are disabled");
        None
    } else {
        Some(gemini_imaging)
    };
    let ocr: Option<Arc<dyn OcrEngine>> = Some(Arc::new(TesseractOcr::new(
        config.tesseract_path.clone(),
        config.tesseract_lang.clone(),
    )));
    let imaging_service = Arc::new(ImagingService::new(generator, analyzer, ocr));

    let data = Data {
        config: Arc::clone(&config),
        channels: channel_service,
        ai: ai_service,
        imaging: imaging_service,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.prefix.clone()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(discord::events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    if let Err(e) = poise::builtins::on_error(error).await {
                        tracing::error!("Error while handling error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                presence::spawn_rotation(
                    ctx.clone(),
                    data.config.statuses.clone(),
                    data.config.status_interval,
                );

                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Failed to create Discord client")?;

    client.start().await.context("Discord client stopped")?;
    Ok(())
}
