use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::EllError;
use crate::http::{DynHttpTransport, collect_body_text, post_json_stream_with_headers, post_json_with_headers};
use crate::provider::{
    CallResult, ClientType, ModelClient, Provider, ProviderResponse, ResponseLogger,
};
use crate::tools::ToolRegistry;
use crate::types::{ApiParams, Message, ResponseMetadata};

use super::PROVIDER_NAME;
use super::error::parse_openai_error;
use super::request::build_chat_body;
use super::response::{assemble, decode_response};
use super::stream::aggregate_stream;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client handle for the OpenAI Chat Completions API and compatible servers.
#[derive(Clone)]
pub struct OpenAiClient {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) organization: Option<String>,
    pub(crate) project: Option<String>,
}

impl OpenAiClient {
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            organization: None,
            project: None,
        }
    }

    /// Points the client at another server, e.g. a local OpenAI-compatible gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self, stream: bool) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if !self.api_key.is_empty() {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            );
        }
        headers.insert(
            "Accept".to_string(),
            if stream {
                "text/event-stream"
            } else {
                "application/json"
            }
            .to_string(),
        );
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
        if let Some(project) = &self.project {
            headers.insert("OpenAI-Project".to_string(), project.clone());
        }
        headers
    }
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl ModelClient for OpenAiClient {
    fn client_type(&self) -> ClientType {
        ClientType::OPENAI
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adapter for the OpenAI Chat Completions API.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiChatProvider;

impl OpenAiChatProvider {
    pub fn new() -> Self {
        Self
    }

    fn client<'a>(&self, client: &'a dyn ModelClient) -> Result<&'a OpenAiClient, EllError> {
        client.as_any().downcast_ref::<OpenAiClient>().ok_or_else(|| {
            EllError::invalid_request(format!(
                "{PROVIDER_NAME} expects an OpenAI client handle, got {}",
                client.client_type()
            ))
        })
    }
}

#[async_trait]
impl Provider for OpenAiChatProvider {
    async fn call_model(
        &self,
        client: &dyn ModelClient,
        model: &str,
        messages: &[Message],
        api_params: &ApiParams,
        tools: Option<&ToolRegistry>,
    ) -> Result<CallResult, EllError> {
        let client = self.client(client)?;
        let body = build_chat_body(model, messages, api_params, tools)?;
        let endpoint = client.endpoint();
        debug!(
            provider = PROVIDER_NAME,
            model,
            stream = body.stream,
            n = body.n,
            messages = messages.len(),
            "sending chat completion request"
        );

        let headers = client.build_headers(body.stream);
        let mut actual_n = body.n;
        let response = if body.stream {
            let response = post_json_stream_with_headers(
                client.transport.as_ref(),
                endpoint.clone(),
                headers,
                &body.params,
            )
            .await?;
            if !response.is_success() {
                let text = collect_body_text(response.body).await?;
                return Err(parse_openai_error(response.status, &response.headers, &text));
            }
            ProviderResponse::Stream(response.body)
        } else {
            let response = post_json_with_headers(
                client.transport.as_ref(),
                endpoint.clone(),
                headers,
                &body.params,
            )
            .await?;
            let status = response.status;
            let success = response.is_success();
            let response_headers = response.headers.clone();
            let text = response.into_string()?;
            if !success {
                return Err(parse_openai_error(status, &response_headers, &text));
            }
            let value: Value = serde_json::from_str(&text).map_err(|err| {
                EllError::response_decode(
                    PROVIDER_NAME,
                    format!("failed to parse OpenAI response: {err}"),
                )
            })?;
            if let Some(returned) = returned_choices(&value) {
                actual_n = returned;
            }
            ProviderResponse::Json(value)
        };

        Ok(CallResult {
            response,
            actual_streaming: body.stream,
            actual_n,
            final_call_params: body.params,
            endpoint: Some(endpoint),
            structured_output: body.structured,
        })
    }

    async fn process_response(
        &self,
        call_result: CallResult,
        invocation_origin: &str,
        logger: Option<&dyn ResponseLogger>,
        tools: Option<&ToolRegistry>,
    ) -> Result<(Vec<Message>, ResponseMetadata), EllError> {
        let structured = call_result.structured_output;
        let draft = match call_result.response {
            ProviderResponse::Json(value) => decode_response(value, logger)?,
            ProviderResponse::Stream(body) => aggregate_stream(body, logger).await?,
        };
        let (messages, metadata) = assemble(
            draft,
            structured,
            tools,
            invocation_origin,
            call_result.endpoint,
        )?;
        debug!(
            provider = PROVIDER_NAME,
            origin = invocation_origin,
            streamed = call_result.actual_streaming,
            choices = messages.len(),
            "processed chat completion"
        );
        Ok((messages, metadata))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn client_type(&self) -> ClientType {
        ClientType::OPENAI
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Choice count of a buffered body; vendors may return fewer than requested.
fn returned_choices(value: &Value) -> Option<u32> {
    let choices = value.get("choices")?.as_array()?;
    u32::try_from(choices.len()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::reqwest::ReqwestTransport;
    use std::sync::Arc;

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new(Arc::new(ReqwestTransport::default_client().unwrap()), "sk-test")
            .with_base_url(base_url)
    }

    #[test]
    fn endpoint_handles_versioned_base_urls() {
        assert_eq!(
            client("https://api.openai.com").endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            client("http://localhost:11434/v1/").endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn headers_carry_credentials_and_scoping() {
        let headers = client("https://api.openai.com")
            .with_organization("org-1")
            .with_project("proj-1")
            .build_headers(true);
        assert_eq!(headers["Authorization"], "Bearer sk-test");
        assert_eq!(headers["Accept"], "text/event-stream");
        assert_eq!(headers["OpenAI-Organization"], "org-1");
        assert_eq!(headers["OpenAI-Project"], "proj-1");
    }

    #[test]
    fn returned_choices_counts_vendor_output() {
        let value = serde_json::json!({"choices": [{"index": 0}, {"index": 1}]});
        assert_eq!(returned_choices(&value), Some(2));
        assert_eq!(returned_choices(&serde_json::json!({"id": "x"})), None);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", client("https://api.openai.com"));
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn rejects_foreign_client_handles() {
        struct Other;
        impl ModelClient for Other {
            fn client_type(&self) -> ClientType {
                ClientType::new("other")
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        match OpenAiChatProvider.client(&Other) {
            Err(EllError::InvalidRequest { message }) => assert!(message.contains("other")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
