// The chat pipeline: every message in an active channel is either an image
// request or a turn of conversation for the channel's AI provider.

use crate::core::ai::context::{ContextMessage, ContextSelector};
use crate::core::ai::formatting::{split_message, truncate_chars, DISCORD_MESSAGE_LIMIT};
use crate::core::ai::ChatRequest;
use crate::core::channels::ChannelConfig;
use crate::core::imaging::{detect_image_intent, ImageIntent, ImageRequest};
use crate::discord::commands::imaging::{describe_error, image_attachment, is_image};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

const APOLOGY: &str = "Sorry, I encountered an error processing your request. Please try again later.";

/// Whether the message is one of our own prefix commands (handled by poise).
pub fn is_own_command(content: &str, prefix: &str) -> bool {
    content
        .trim_start()
        .strip_prefix(prefix)
        .map(|rest| rest.trim_start().to_lowercase().starts_with("setsuna"))
        .unwrap_or(false)
}

/// Removes mentions of the bot so they don't end up in prompts.
pub fn strip_bot_mention(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{}>", bot_id), "")
        .replace(&format!("<@!{}>", bot_id), "")
        .trim()
        .to_string()
}

/// How an attached image is presented to the text model.
pub fn image_note(author: &str, description: &str) -> String {
    format!("[{} shared an image: {}]", author, description.trim())
}

fn author_name(user: &serenity::User) -> String {
    user.global_name.clone().unwrap_or_else(|| user.name.clone())
}

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    if message.author.bot || is_own_command(&message.content, &data.config.prefix) {
        return Ok(());
    }

    let Some(config) = data.channels.active_config(message.channel_id.get()).await? else {
        return Ok(());
    };

    let bot_id = ctx.cache.current_user().id;
    let text = strip_bot_mention(&message.content, bot_id.get());
    let image_urls: Vec<String> = message
        .attachments
        .iter()
        .filter(|a| is_image(a))
        .map(|a| a.url.clone())
        .collect();

    if let Some(intent) = detect_image_intent(&text, !image_urls.is_empty()) {
        return handle_image_request(ctx, data, message, intent, image_urls.first().cloned()).await;
    }

    if text.is_empty() && image_urls.is_empty() {
        return Ok(());
    }

    handle_chat(ctx, data, message, &config, bot_id, image_urls).await
}

async fn handle_image_request(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
    intent: ImageIntent,
    source_image_url: Option<String>,
) -> Result<(), Error> {
    let request = match intent {
        ImageIntent::Generate { prompt } => ImageRequest {
            prompt,
            source_image_url: None,
        },
        ImageIntent::StyleTransfer { style } => ImageRequest {
            prompt: style,
            source_image_url,
        },
    };

    let typing = message.channel_id.start_typing(&ctx.http);
    let result = data.imaging.generate(message.channel_id.get(), request).await;
    typing.stop();

    match result {
        Ok(generated) => {
            let content = generated
                .caption
                .as_deref()
                .map(|c| truncate_chars(c, DISCORD_MESSAGE_LIMIT))
                .unwrap_or_else(|| "🎨 Here you go!".to_string());
            message
                .channel_id
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .content(content)
                        .add_file(image_attachment(&generated))
                        .reference_message(message),
                )
                .await?;
        }
        Err(e) => {
            message.reply(&ctx.http, describe_error(&e)).await?;
        }
    }
    Ok(())
}

async fn handle_chat(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
    config: &ChannelConfig,
    bot_id: serenity::UserId,
    image_urls: Vec<String>,
) -> Result<(), Error> {
    let typing = message.channel_id.start_typing(&ctx.http);

    let history = message
        .channel_id
        .messages(
            &ctx.http,
            serenity::GetMessages::new().limit(data.config.max_history),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch channel history: {}", e);
            Vec::new()
        });

    // Only the triggering message's images are described; older ones were
    // already answered.
    let mut image_notes = Vec::new();
    if !image_urls.is_empty() && data.imaging.can_analyze() {
        let author = author_name(&message.author);
        for (_, description) in data.imaging.describe_all(&image_urls).await {
            image_notes.push(image_note(&author, &description));
        }
    }

    let mut context: Vec<ContextMessage> = history
        .iter()
        .rev()
        .filter(|m| m.id != message.id)
        .map(|m| {
            let role = if m.author.id == bot_id { "assistant" } else { "user" };
            ContextMessage::new(
                role.to_string(),
                strip_bot_mention(&m.content, bot_id.get()),
                m.timestamp.unix_timestamp(),
                author_name(&m.author),
            )
        })
        .collect();

    let mut current = strip_bot_mention(&message.content, bot_id.get());
    for note in &image_notes {
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(note);
    }
    context.push(ContextMessage::new(
        "user".to_string(),
        current,
        message.timestamp.unix_timestamp(),
        author_name(&message.author),
    ));

    let selected = ContextSelector::new(data.config.context_tokens).select(context);
    if selected.is_empty() {
        typing.stop();
        return Ok(());
    }

    let request = ChatRequest {
        preferred: config.provider,
        model_override: config.model.clone(),
        history: selected,
    };

    let result = data.ai.chat(request).await;
    typing.stop();

    match result {
        Ok(response) => {
            tracing::info!(
                channel_id = message.channel_id.get(),
                provider = %response.provider,
                model = %response.model,
                chars = response.answer.chars().count(),
                "Answered message"
            );

            if data.config.show_reasoning {
                if let Some(reasoning) = &response.reasoning {
                    let embed = serenity::CreateEmbed::new()
                        .title("🧠 Reasoning")
                        .description(truncate_chars(reasoning, 4000))
                        .color(0xDAA520) // Dark Gold
                        .footer(serenity::CreateEmbedFooter::new(format!(
                            "{} · {}",
                            response.provider, response.model
                        )));
                    if let Err(e) = message
                        .channel_id
                        .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                        .await
                    {
                        tracing::error!("Failed to send reasoning embed: {}", e);
                    }
                }
            }

            for chunk in split_message(&response.answer, DISCORD_MESSAGE_LIMIT) {
                if let Err(e) = message.channel_id.say(&ctx.http, chunk).await {
                    tracing::error!("Failed to send AI response: {}", e);
                }
            }
        }
        Err(e) => {
            tracing::error!(channel_id = message.channel_id.get(), "AI error: {}", e);
            message.reply(&ctx.http, APOLOGY).await?;
        }
    }
    Ok(())
}
