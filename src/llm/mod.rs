//! Language model access (OpenAI)

pub mod openai;

pub use openai::{ChatMessage, ChatOptions, OpenAiClient, OpenAiError};
