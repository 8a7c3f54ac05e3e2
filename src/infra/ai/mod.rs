pub mod gemini_client;
pub mod openai_compat_client;

pub use gemini_client::GeminiClient;
pub use openai_compat_client::OpenAiCompatClient;
