//! The two-step contract every vendor adapter implements.
//!
//! [`Provider::call_model`] translates normalized messages into a vendor request and
//! issues it; [`Provider::process_response`] turns the vendor answer back into
//! [`Message`]s. Adapters are selected by the [`ClientType`] of the caller's client
//! handle through [`crate::registry::ProviderRegistry`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::EllError;
use crate::http::HttpBodyStream;
use crate::tools::ToolRegistry;
use crate::types::{ApiParams, Message, ResponseMetadata};

pub mod openai_chat;
pub(crate) mod retry;

/// Tag identifying the family of a client handle.
///
/// # Examples
///
/// ```
/// use ell_core::provider::ClientType;
///
/// const OLLAMA: ClientType = ClientType::new("ollama");
/// assert_eq!(OLLAMA.as_str(), "ollama");
/// assert_ne!(OLLAMA, ClientType::OPENAI);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientType(&'static str);

impl ClientType {
    pub const OPENAI: ClientType = ClientType("openai");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Opaque vendor client handle owned by the caller.
///
/// Adapters downcast through [`ModelClient::as_any`] to reach their concrete client.
pub trait ModelClient: Send + Sync {
    fn client_type(&self) -> ClientType;

    fn as_any(&self) -> &dyn Any;
}

/// Thread-safe client handle.
pub type DynModelClient = Arc<dyn ModelClient>;

/// Raw vendor answer handed from `call_model` to `process_response`.
pub enum ProviderResponse {
    /// Fully buffered JSON body.
    Json(Value),
    /// Body still being streamed.
    Stream(HttpBodyStream),
}

impl fmt::Debug for ProviderResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Outcome of [`Provider::call_model`].
#[derive(Debug)]
pub struct CallResult {
    pub response: ProviderResponse,
    /// Whether the vendor was actually asked to stream; adapters may downgrade.
    pub actual_streaming: bool,
    /// Number of completion choices the vendor produced when the adapter already knows
    /// it (buffered bodies); otherwise the number requested.
    pub actual_n: u32,
    /// Parameters exactly as sent to the vendor.
    pub final_call_params: Map<String, Value>,
    /// Endpoint the request was sent to, when the adapter knows it.
    pub endpoint: Option<String>,
    /// The caller asked for JSON output, so the reply text decodes into a parsed block.
    pub structured_output: bool,
}

/// Receives generated text while a response is processed.
///
/// Streaming adapters report deltas as they are decoded; buffered responses report
/// each choice's text once. Any `Fn(usize, &str)` closure is a logger.
pub trait ResponseLogger: Send + Sync {
    /// `choice` is the completion index the text belongs to.
    fn log_text(&self, choice: usize, text: &str);
}

impl<F> ResponseLogger for F
where
    F: Fn(usize, &str) + Send + Sync,
{
    fn log_text(&self, choice: usize, text: &str) {
        self(choice, text)
    }
}

/// Mediates between the normalized message model and one vendor API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Builds the vendor request from `messages`, `api_params`, and the tool catalog,
    /// then sends it.
    ///
    /// # Errors
    ///
    /// [`EllError::InvalidRequest`] when the inputs cannot be expressed for this vendor
    /// (checked before any network traffic); provider failures otherwise.
    async fn call_model(
        &self,
        client: &dyn ModelClient,
        model: &str,
        messages: &[Message],
        api_params: &ApiParams,
        tools: Option<&ToolRegistry>,
    ) -> Result<CallResult, EllError>;

    /// Converts the vendor answer into one [`Message`] per completion choice.
    ///
    /// # Errors
    ///
    /// [`EllError::ResponseDecode`] when the payload is malformed, names a tool that is
    /// not in `tools`, or fails structured decoding.
    async fn process_response(
        &self,
        call_result: CallResult,
        invocation_origin: &str,
        logger: Option<&dyn ResponseLogger>,
        tools: Option<&ToolRegistry>,
    ) -> Result<(Vec<Message>, ResponseMetadata), EllError>;

    fn supports_streaming(&self) -> bool;

    /// Client family this adapter serves.
    fn client_type(&self) -> ClientType;

    /// Short identifier used in logs and error messages.
    fn name(&self) -> &'static str {
        self.client_type().as_str()
    }
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn Provider>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_are_loggers() {
        let seen = Mutex::new(Vec::new());
        let logger = |choice: usize, text: &str| {
            seen.lock().unwrap().push(format!("{choice}:{text}"));
        };
        let dyn_logger: &dyn ResponseLogger = &logger;
        dyn_logger.log_text(0, "he");
        dyn_logger.log_text(1, "llo");
        assert_eq!(*seen.lock().unwrap(), vec!["0:he", "1:llo"]);
    }

    #[test]
    fn provider_response_debug_hides_stream() {
        let body: HttpBodyStream = Box::pin(futures_util::stream::empty());
        assert_eq!(format!("{:?}", ProviderResponse::Stream(body)), "Stream(..)");
    }
}
