use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EllError;
use crate::http::DynHttpTransport;
use crate::provider::DynModelClient;
use crate::provider::openai_chat::{OpenAiChatProvider, OpenAiClient};
use crate::registry::ProviderRegistry;

/// Describes one vendor client handle.
///
/// # Examples
///
/// ```
/// use ell_core::config::{ClientConfig, Credential, ProviderKind};
///
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "client": "open_ai",
///     "credential": {"type": "bearer", "token": "sk-test"},
///     "extra": {"organization": "org-1"}
/// }"#).unwrap();
/// assert!(matches!(config.client, ProviderKind::OpenAi));
/// assert!(matches!(config.credential, Credential::Bearer { .. }));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client: ProviderKind,
    pub credential: Credential,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Vendor-specific settings such as `organization` or `project`.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

/// Client families with a bundled adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
}

/// Authentication material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    ApiKey {
        /// Header name; the vendor default when unset.
        header: Option<String>,
        key: String,
    },
    Bearer { token: String },
    /// Local servers that need no authentication.
    None,
}

/// Parses a JSON array of client configurations.
pub fn load_client_configs(json: &str) -> Result<Vec<ClientConfig>, EllError> {
    serde_json::from_str(json).map_err(|err| EllError::InvalidConfig {
        field: "clients".to_string(),
        reason: err.to_string(),
    })
}

/// Builds the client handle described by `config`.
///
/// # Errors
///
/// [`EllError::Auth`] when the credential is missing or unusable for the vendor, and
/// [`EllError::InvalidConfig`] for malformed fields.
pub fn build_client_from_config(
    config: &ClientConfig,
    transport: DynHttpTransport,
) -> Result<DynModelClient, EllError> {
    let client: DynModelClient = match config.client {
        ProviderKind::OpenAi => {
            let api_key = extract_api_key(&config.credential, "openai")?;
            let mut client = OpenAiClient::new(transport, api_key);

            if let Some(base_url) = &config.base_url {
                if base_url.trim().is_empty() {
                    return Err(EllError::InvalidConfig {
                        field: "base_url".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
                client = client.with_base_url(base_url.clone());
            }
            if let Some(org) = string_extra(config, "organization")? {
                client = client.with_organization(org);
            }
            if let Some(project) = string_extra(config, "project")? {
                client = client.with_project(project);
            }

            Arc::new(client)
        }
    };

    Ok(client)
}

/// Installs the bundled adapters into `registry`.
pub fn register_default_providers(registry: &ProviderRegistry) {
    registry.register(Arc::new(OpenAiChatProvider::new()));
}

fn string_extra(config: &ClientConfig, key: &str) -> Result<Option<String>, EllError> {
    match config.extra.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(EllError::InvalidConfig {
            field: format!("extra.{key}"),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn extract_api_key(credential: &Credential, client: &'static str) -> Result<String, EllError> {
    match credential {
        Credential::ApiKey { key, .. } => Ok(key.clone()),
        Credential::Bearer { token } => Ok(token.clone()),
        Credential::None => Err(EllError::Auth {
            message: format!("client {client} requires a credential"),
        }),
    }
}
