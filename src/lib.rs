// Public modules
pub mod accumulator;
pub mod chat;
pub mod chat_model;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod sse;
pub mod types;

// Re-exports
pub use accumulator::{NO_RESPONSE_PLACEHOLDER, TokenAccumulator};
pub use chat_model::{AiMessage, ChatGemini, LanguageModel, StreamObserver, consume_stream};
pub use client::{API_KEY_ENV, Gemini};
pub use client_logger::{ClientLogger, JsonLinesLogger};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
