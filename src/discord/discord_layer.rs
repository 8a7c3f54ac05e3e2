// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events/mod.rs"]
pub mod events;

use crate::config::BotConfig;
use crate::core::ai::AiService;
use crate::core::channels::ChannelService;
use crate::core::imaging::ImagingService;
use crate::infra::channels::JsonChannelStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event.
pub struct Data {
    pub config: Arc<BotConfig>,
    pub channels: Arc<ChannelService<JsonChannelStore>>,
    pub ai: Arc<AiService>,
    pub imaging: Arc<ImagingService>,
}
