use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option names understood at the core boundary; anything else lands in
/// [`ApiParams::extra`] and is forwarded verbatim.
pub const RECOGNIZED_OPTIONS: [&str; 9] = [
    "temperature",
    "top_p",
    "max_tokens",
    "n",
    "stream",
    "response_format",
    "stop",
    "seed",
    "user",
];

/// Request options handed to [`crate::provider::Provider::call_model`].
///
/// Every field is optional so callers only set the knobs they care about. The core
/// never validates `extra`.
///
/// # Examples
///
/// ```
/// use ell_core::types::ApiParams;
///
/// let params = ApiParams::from_map(
///     serde_json::json!({ "temperature": 0.2, "n": 2, "logit_bias": {"50256": -100} })
///         .as_object()
///         .cloned()
///         .unwrap(),
/// )
/// .unwrap();
/// assert_eq!(params.n, Some(2));
/// assert!(params.extra.contains_key("logit_bias"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiParams {
    /// Sampling temperature, typically within `0.0..=2.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter where `1.0` disables the filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Number of completions requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// End-user identifier forwarded for abuse monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Unrecognized options, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiParams {
    /// Splits a loose option bag into recognized fields and pass-through extras.
    ///
    /// # Errors
    ///
    /// Returns the serde error when a recognized option has the wrong type.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(map))
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns `true` when `name` is one of [`RECOGNIZED_OPTIONS`].
    pub fn is_recognized(name: &str) -> bool {
        RECOGNIZED_OPTIONS.contains(&name)
    }
}

/// Response-formatting modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text output.
    Text,
    /// Any JSON object.
    JsonObject,
    /// JSON constrained by a named schema.
    JsonSchema {
        name: String,
        schema: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
}

impl ResponseFormat {
    /// Returns `true` when the response payload must be decoded into a parsed block.
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Text)
    }
}
