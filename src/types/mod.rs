//! Shared data structures: the polymorphic content model, messages, tool references,
//! and the request/response metadata exchanged with providers.
//!
//! These types normalize vendor-specific payloads so the rest of the crate can stay
//! agnostic of individual API differences.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod content;
pub mod message;
pub mod params;
pub mod tool;

pub use content::{
    AUDIO_FORMAT_PCM_F32, ContentBlock, ContentBlockFields, ContentInput, ContentKind,
    ImageDetail, ImageHandle, MessageContent, coerce_content_list,
};
pub use message::{Message, ParsedView, Role, assistant, system, user};
pub use params::{ApiParams, RECOGNIZED_OPTIONS, ResponseFormat};
pub use tool::{TOOL_CALL_ID_PARAM, ToolCall, ToolDefinition, ToolResult};

/// Token usage metrics collected from the provider.
///
/// # Examples
///
/// ```
/// # use ell_core::types::TokenUsage;
/// let usage = TokenUsage {
///     prompt_tokens: Some(1200),
///     completion_tokens: Some(200),
///     total_tokens: Some(1400),
///     details: None,
/// };
/// assert_eq!(usage.total_tokens, Some(1400));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TokenUsage {
    /// prompt tokens
    pub prompt_tokens: Option<u64>,
    /// completion tokens
    pub completion_tokens: Option<u64>,
    /// Total tokens across prompt and completion.
    pub total_tokens: Option<u64>,
    /// Provider-specific accounting details.
    pub details: Option<HashMap<String, Value>>,
}

/// Why a completion choice stopped generating content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

/// Provider metadata returned with each response.
///
/// Use this structure to correlate logs, surface request IDs to clients, or
/// surface endpoint information during incident triage.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderMetadata {
    /// Provider identifier such as `openai_chat`.
    pub provider: String,
    /// Upstream request identifier.
    pub request_id: Option<String>,
    /// Endpoint description or URL.
    pub endpoint: Option<String>,
    /// Raw response excerpt for debugging.
    pub raw: Option<Value>,
}

/// Auxiliary data produced alongside the messages of a processed response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResponseMetadata {
    /// Effective model identifier reported by the provider.
    pub model: Option<String>,
    /// Token usage accounting.
    pub usage: Option<TokenUsage>,
    /// Finish reason per completion choice, in choice order.
    pub finish_reasons: Vec<Option<FinishReason>>,
    /// Origin label of the program that triggered the call.
    pub invocation_origin: String,
    /// Metadata about the provider invocation.
    pub provider: ProviderMetadata,
}
