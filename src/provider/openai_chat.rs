//! Adapter for the OpenAI Chat Completions API.
//!
//! Also serves OpenAI-compatible servers (Ollama, vLLM, gateways) through
//! [`OpenAiClient::with_base_url`].

mod error;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::{DEFAULT_BASE_URL, OpenAiChatProvider, OpenAiClient};

pub(crate) const PROVIDER_NAME: &str = "openai_chat";
