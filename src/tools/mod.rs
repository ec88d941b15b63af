//! Tool implementations, the registry that resolves them by name, and the settings
//! used when a message's tool calls are executed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::EllError;
use crate::types::{ContentBlock, ContentInput, ImageHandle, ToolDefinition, ToolResult};

pub mod orchestrate;

pub use orchestrate::TOOL_ERROR_PREFIX;

/// Something a model can invoke through a [`crate::types::ToolCall`].
///
/// Implementations receive the bound parameters as JSON. When invoked through
/// [`crate::types::ToolCall::invoke_as_block`] the object also carries the correlation
/// id under [`crate::types::TOOL_CALL_ID_PARAM`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declaration advertised to vendors.
    fn definition(&self) -> &ToolDefinition;

    /// Runs the tool.
    async fn invoke(&self, params: Value) -> Result<ToolOutput, EllError>;

    fn name(&self) -> &str {
        &self.definition().name
    }
}

/// Thread-safe tool handle.
pub type DynTool = Arc<dyn Tool>;

/// Raw value returned by a tool, normalized into a [`ToolResult`] by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Becomes a single text block.
    Text(String),
    /// Stored as-is.
    Blocks(Vec<ContentBlock>),
    /// Used as-is, except that the invoking call's id replaces any id it carries.
    Result(ToolResult),
    /// Coerced like any other content.
    Content(ContentInput),
}

impl ToolOutput {
    /// Wraps the output as the result of the call identified by `tool_call_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when a [`ToolOutput::Content`] value cannot
    /// be coerced.
    pub fn into_tool_result(self, tool_call_id: Option<String>) -> Result<ToolResult, EllError> {
        let result = match self {
            Self::Text(text) => ToolResult::text(tool_call_id, text),
            Self::Blocks(blocks) => ToolResult::new(tool_call_id, blocks),
            Self::Result(result) => stamp_call_id(result, tool_call_id),
            Self::Content(input) => match ContentBlock::coerce(input)? {
                ContentBlock::ToolResult(result) => stamp_call_id(result, tool_call_id),
                block => ToolResult::new(tool_call_id, vec![block]),
            },
        };
        Ok(result)
    }
}

/// Results always answer the call that produced them; the tool's own id only
/// survives when the call has none.
fn stamp_call_id(mut result: ToolResult, tool_call_id: Option<String>) -> ToolResult {
    if tool_call_id.is_some() {
        result.tool_call_id = tool_call_id;
    }
    result
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<ContentBlock>> for ToolOutput {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

impl From<ToolResult> for ToolOutput {
    fn from(result: ToolResult) -> Self {
        Self::Result(result)
    }
}

impl From<ContentBlock> for ToolOutput {
    fn from(block: ContentBlock) -> Self {
        Self::Content(ContentInput::Block(block))
    }
}

impl From<ImageHandle> for ToolOutput {
    fn from(image: ImageHandle) -> Self {
        Self::Content(ContentInput::Image(image))
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Content(ContentInput::Raw(value))
    }
}

/// Tool backed by an async closure.
///
/// # Examples
///
/// ```
/// use ell_core::tools::{FunctionTool, Tool, ToolOutput};
/// use serde_json::{json, Value};
///
/// let add = FunctionTool::new("add", |params: Value| async move {
///     let sum = params["a"].as_i64().unwrap_or(0) + params["b"].as_i64().unwrap_or(0);
///     Ok::<_, ell_core::EllError>(ToolOutput::from(sum.to_string()))
/// })
/// .with_description("Adds two integers");
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let output = add.invoke(json!({"a": 2, "b": 3})).await.unwrap();
/// assert_eq!(output, ToolOutput::Text("5".into()));
/// # });
/// ```
pub struct FunctionTool<F> {
    definition: ToolDefinition,
    handler: F,
}

impl<F, Fut> FunctionTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, EllError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: None,
                parameters: None,
            },
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Sets the JSON Schema describing the parameter object.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.definition.parameters = Some(schema);
        self
    }

    pub fn into_dyn(self) -> DynTool {
        Arc::new(self)
    }
}

#[async_trait]
impl<F, Fut> Tool for FunctionTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, EllError>> + Send + 'static,
{
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, params: Value) -> Result<ToolOutput, EllError> {
        (self.handler)(params).await
    }
}

/// Name-keyed catalog of tools available to a conversation.
///
/// The registry is owned outside the message model; tool calls only store the tool
/// name and resolve it here.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, DynTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any tool registered under the same name.
    pub fn register(&mut self, tool: DynTool) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Builder-style variant of [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: DynTool) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<DynTool> {
        self.tools.get(name).cloned()
    }

    /// Looks a tool up, failing with [`EllError::ToolInvocation`] when it is unknown.
    pub fn require(&self, name: &str) -> Result<DynTool, EllError> {
        self.get(name)
            .ok_or_else(|| EllError::tool(name, "tool is not registered"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool declarations sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| tool.definition().clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

/// How the tool calls of a message are executed.
#[derive(Debug, Clone, Default)]
pub struct ToolExecution {
    /// Start every call at once instead of one after another.
    pub parallel: bool,
    /// Upper bound on calls in flight when `parallel` is set.
    pub max_workers: Option<usize>,
    /// Aborts the whole batch when cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl ToolExecution {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel() -> Self {
        Self {
            parallel: true,
            ..Self::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}
