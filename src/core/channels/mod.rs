pub mod channel_models;
pub mod channel_service;
pub mod channel_store;

pub use channel_models::ChannelConfig;
pub use channel_service::{ChannelError, ChannelService};
pub use channel_store::{ChannelMirror, ChannelStore, StoreError};
