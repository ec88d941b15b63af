//! Polymorphic message model, provider dispatch, and tool orchestration for LLM calls.
//!
//! Build messages with [`system`], [`user`], and [`assistant`], send them through a
//! [`Provider`] selected by [`registry::ProviderRegistry`], and feed tool calls back
//! with [`Message::call_tools_and_collect_as_message`].

pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod tools;
pub mod types;

pub use error::{EllError, ErrorKind};
pub use provider::{
    CallResult, ClientType, DynModelClient, DynProvider, ModelClient, Provider, ProviderResponse,
    ResponseLogger,
};
pub use registry::{
    CompletionRequest, ProviderRegistry, global_registry, provider_for_client, register_provider,
};
pub use tools::{DynTool, FunctionTool, Tool, ToolExecution, ToolOutput, ToolRegistry};
pub use types::*;
