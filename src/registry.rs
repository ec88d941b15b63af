//! Lookup of provider adapters by client type.
//!
//! A [`ProviderRegistry`] can be owned explicitly; the process-wide instance behind
//! [`register_provider`] and [`provider_for_client`] is pre-populated with the bundled
//! adapters and is meant to be written at startup and read afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::config::register_default_providers;
use crate::error::EllError;
use crate::provider::{CallResult, ClientType, DynProvider, ModelClient, ResponseLogger};
use crate::tools::ToolRegistry;
use crate::types::{ApiParams, Message, ResponseMetadata};

/// Maps client types to the adapter that serves them.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ClientType, DynProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the bundled adapters.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        register_default_providers(&registry);
        registry
    }

    /// Registers `provider` for its client type and returns the adapter it replaced.
    pub fn register(&self, provider: DynProvider) -> Option<DynProvider> {
        let client_type = provider.client_type();
        debug!(client_type = client_type.as_str(), provider = provider.name(), "registering provider");
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client_type, provider)
    }

    /// Builder-style variant of [`ProviderRegistry::register`].
    pub fn with_provider(self, provider: DynProvider) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, client_type: ClientType) -> Option<DynProvider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&client_type)
            .cloned()
    }

    /// Selects the adapter for `client`.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidRequest`] when no adapter serves the client's type.
    pub fn provider_for(&self, client: &dyn ModelClient) -> Result<DynProvider, EllError> {
        let client_type = client.client_type();
        self.get(client_type).ok_or_else(|| {
            EllError::invalid_request(format!(
                "no provider registered for client type {client_type}"
            ))
        })
    }

    /// Registered client types, sorted.
    pub fn client_types(&self) -> Vec<ClientType> {
        let mut types: Vec<ClientType> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        types.sort();
        types
    }

    /// Dispatches [`crate::provider::Provider::call_model`] to the adapter for `client`.
    pub async fn call_model(
        &self,
        client: &dyn ModelClient,
        model: &str,
        messages: &[Message],
        api_params: &ApiParams,
        tools: Option<&ToolRegistry>,
    ) -> Result<CallResult, EllError> {
        let provider = self.provider_for(client)?;
        provider
            .call_model(client, model, messages, api_params, tools)
            .await
    }

    /// Runs `call_model` followed by `process_response` on the adapter for `client`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use ell_core::http::reqwest::default_dyn_transport;
    /// use ell_core::provider::openai_chat::OpenAiClient;
    /// use ell_core::registry::{CompletionRequest, ProviderRegistry};
    ///
    /// # async fn run() -> Result<(), ell_core::EllError> {
    /// let client = OpenAiClient::new(default_dyn_transport()?, "sk-...");
    /// let messages = vec![ell_core::system("Be terse.")?, ell_core::user("Say hi")?];
    /// let registry = ProviderRegistry::with_defaults();
    /// let (replies, metadata) = registry
    ///     .complete(&client, CompletionRequest::new("gpt-4o-mini", &messages).with_origin("demo"))
    ///     .await?;
    /// println!("{} ({:?})", replies[0].text(), metadata.usage);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn complete(
        &self,
        client: &dyn ModelClient,
        request: CompletionRequest<'_>,
    ) -> Result<(Vec<Message>, ResponseMetadata), EllError> {
        let provider = self.provider_for(client)?;
        let default_params = ApiParams::default();
        let api_params = request.api_params.unwrap_or(&default_params);
        debug!(
            provider = provider.name(),
            model = request.model,
            origin = request.invocation_origin,
            stream = api_params.stream.unwrap_or(false),
            n = api_params.n.unwrap_or(1),
            "dispatching completion"
        );
        let call_result = provider
            .call_model(
                client,
                request.model,
                request.messages,
                api_params,
                request.tools,
            )
            .await?;
        provider
            .process_response(
                call_result,
                request.invocation_origin,
                request.logger,
                request.tools,
            )
            .await
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("client_types", &self.client_types())
            .finish()
    }
}

/// Inputs of [`ProviderRegistry::complete`].
#[derive(Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub api_params: Option<&'a ApiParams>,
    pub tools: Option<&'a ToolRegistry>,
    pub invocation_origin: &'a str,
    pub logger: Option<&'a dyn ResponseLogger>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            api_params: None,
            tools: None,
            invocation_origin: "",
            logger: None,
        }
    }

    pub fn with_params(mut self, api_params: &'a ApiParams) -> Self {
        self.api_params = Some(api_params);
        self
    }

    pub fn with_tools(mut self, tools: &'a ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Label of the calling program, copied into the response metadata.
    pub fn with_origin(mut self, invocation_origin: &'a str) -> Self {
        self.invocation_origin = invocation_origin;
        self
    }

    pub fn with_logger(mut self, logger: &'a dyn ResponseLogger) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// The process-wide registry, created with the bundled adapters on first use.
pub fn global_registry() -> &'static ProviderRegistry {
    static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ProviderRegistry::with_defaults)
}

/// Registers `provider` in the process-wide registry, replacing any adapter for the
/// same client type.
pub fn register_provider(provider: DynProvider) -> Option<DynProvider> {
    global_registry().register(provider)
}

/// Selects the adapter for `client` from the process-wide registry.
pub fn provider_for_client(client: &dyn ModelClient) -> Result<DynProvider, EllError> {
    global_registry().provider_for(client)
}
