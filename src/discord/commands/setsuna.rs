// `setsuna` command group: turn the bot on or off per channel and inspect
// which providers are usable. Works both as `!setsuna ...` and `/setsuna ...`.

use crate::core::ai::ProviderKind;
use crate::core::channels::ChannelError;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ProviderChoice {
    #[name = "gemini"]
    Gemini,
    #[name = "groq"]
    Groq,
    #[name = "chatgpt"]
    ChatGpt,
    #[name = "deepseek"]
    DeepSeek,
    #[name = "together"]
    Together,
}

impl From<ProviderChoice> for ProviderKind {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Gemini => ProviderKind::Gemini,
            ProviderChoice::Groq => ProviderKind::Groq,
            ProviderChoice::ChatGpt => ProviderKind::ChatGpt,
            ProviderChoice::DeepSeek => ProviderKind::DeepSeek,
            ProviderChoice::Together => ProviderKind::Together,
        }
    }
}

/// Control Setsuna in this channel
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("activate", "deactivate", "status", "providers", "help"),
    subcommand_required
)]
pub async fn setsuna(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start answering messages in this channel
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn activate(
    ctx: Context<'_>,
    #[description = "Which AI provider to use (defaults to the bot's default)"] provider: Option<
        ProviderChoice,
    >,
    #[description = "Model override for that provider"] model: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let provider: ProviderKind = provider
        .map(Into::into)
        .unwrap_or(data.config.default_provider);

    let result = data
        .channels
        .activate(
            ctx.channel_id().get(),
            ctx.guild_id().map(|g| g.get()),
            provider,
            model,
            ctx.author().id.get(),
            &data.ai.available(),
        )
        .await;

    match result {
        Ok(config) => {
            let model = config
                .model
                .as_deref()
                .or_else(|| data.ai.default_model(provider))
                .unwrap_or(provider.default_model());
            ctx.say(format!(
                "✅ Setsuna activated in this channel using **{}** (`{}`)!",
                provider, model
            ))
            .await?;
        }
        Err(ChannelError::ProviderUnavailable(kind)) => {
            ctx.say(format!(
                "❌ Cannot activate {} model: API key not configured. Please ask the bot administrator to set up `{}_API_KEY`.",
                kind,
                kind.env_prefix()
            ))
            .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Stop answering messages in this channel
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn deactivate(ctx: Context<'_>) -> Result<(), Error> {
    match ctx
        .data()
        .channels
        .deactivate(ctx.channel_id().get(), ctx.author().id.get())
        .await
    {
        Ok(()) => {
            ctx.say("👋 Setsuna deactivated in this channel!").await?;
        }
        Err(ChannelError::NotActive) => {
            ctx.say("Setsuna is not active in this channel.").await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Show whether Setsuna is active here and with which provider
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let record = data.channels.get(ctx.channel_id().get()).await?;
    let (config, previous) = match record {
        Some(config) if config.active => (Some(config), None),
        other => (None, other),
    };

    let mut embed = serenity::CreateEmbed::new()
        .title("🌸 Setsuna status")
        .color(0xF4A7B9)
        .timestamp(serenity::Timestamp::now());

    match config {
        Some(config) => {
            let model = config
                .model
                .clone()
                .or_else(|| data.ai.default_model(config.provider).map(String::from))
                .unwrap_or_else(|| config.provider.default_model().to_string());
            let chain = data
                .ai
                .provider_chain(config.provider)
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" → ");

            embed = embed
                .description("Bot is online and active in this channel.")
                .field("Provider", config.provider.to_string(), true)
                .field("Model", format!("`{}`", model), true)
                .field("Fallback chain", if chain.is_empty() { "none".into() } else { chain }, false);
            if let Some(user) = config.updated_by {
                embed = embed.field(
                    "Last changed",
                    format!("by <@{}> <t:{}:R>", user, config.updated_at.timestamp()),
                    false,
                );
            }
        }
        None => {
            let active_here = data
                .channels
                .list_active(ctx.guild_id().map(|g| g.get()))
                .await?
                .len();
            embed = embed.description(format!(
                "Bot is online, but not active in this channel. Use `{}setsuna activate [provider]` to start.\nActive channels in this server: {}",
                data.config.prefix, active_here
            ));
            if let Some(previous) = previous {
                embed = embed.field("Last used provider", previous.provider.to_string(), true);
            }
        }
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List the AI providers and whether they are configured
#[poise::command(prefix_command, slash_command)]
pub async fn providers(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let lines: Vec<String> = ProviderKind::ALL
        .iter()
        .map(|kind| {
            let keys = data.ai.key_count(*kind);
            let marker = if keys > 0 { "🟢" } else { "⚪" };
            let model = data.ai.default_model(*kind).unwrap_or(kind.default_model());
            let default = if *kind == data.config.default_provider {
                " (default)"
            } else {
                ""
            };
            format!(
                "{} **{}**{} `{}` · {} key(s)",
                marker,
                kind.id(),
                default,
                model,
                keys
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("🤖 AI providers")
        .description(lines.join("\n"))
        .color(0x5865F2)
        .footer(serenity::CreateEmbedFooter::new(
            "Providers without keys are skipped in the fallback chain.",
        ));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// How to use Setsuna
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let prefix = &ctx.data().config.prefix;
    ctx.say(format!(
        "Available commands: `{p}setsuna activate [provider] [model]`, `{p}setsuna deactivate`, \
         `{p}setsuna status`, `{p}setsuna providers`\n\
         Once active, just talk in the channel. Ask me to draw something (\"draw a cat\", \"幫我畫一隻貓\") \
         and I'll make an image; attach pictures and I'll look at them.\n\
         Slash commands: `/imagine`, `/describe`, `/ocr`",
        p = prefix
    ))
    .await?;
    Ok(())
}
