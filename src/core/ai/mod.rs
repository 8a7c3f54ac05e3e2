pub mod ai_error;
pub mod ai_service;
pub mod context;
pub mod formatting;
pub mod key_ring;
pub mod models;
pub mod persona;

pub use ai_error::AiError;
pub use ai_service::{AiProvider, AiService, ChatSettings};
pub use key_ring::KeyRing;
pub use models::{AiConfig, AiMessage, AiProviderResponse, ChatRequest, ProviderKind};
