// Non-command gateway events.

pub mod message_handler;

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Event handler for everything that is not a command.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!(
                user = %data_about_bot.user.name,
                guilds = data_about_bot.guilds.len(),
                "Connected to Discord"
            );
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = message_handler::handle_message(ctx, data, new_message).await {
                tracing::error!(
                    channel_id = new_message.channel_id.get(),
                    "Error handling message: {}",
                    e
                );
            }
        }
        serenity::FullEvent::ChannelDelete { channel, .. } => {
            if let Err(e) = data.channels.forget(channel.id.get()).await {
                tracing::warn!(channel_id = channel.id.get(), "Failed to forget deleted channel: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}
