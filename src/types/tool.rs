//! Tool invocations referenced from message content and their outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EllError;
use crate::tools::{ToolOutput, ToolRegistry};

use super::content::{ContentBlock, render_blocks};
use super::message::{Message, Role};

/// Reserved parameter name under which the correlation id reaches a tool.
pub const TOOL_CALL_ID_PARAM: &str = "_tool_call_id";

/// A model-initiated (or caller-built) invocation of a named tool.
///
/// The tool is referenced by name and resolved through a [`ToolRegistry`] at invocation
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool in the registry.
    pub tool: String,
    /// Bound parameters, usually a JSON object.
    pub params: Value,
    /// Correlation id chosen by the vendor.
    pub tool_call_id: Option<String>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, params: Value) -> Self {
        Self {
            tool: tool.into(),
            params,
            tool_call_id: None,
        }
    }

    pub fn with_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    /// Applies the bound parameters to the tool and returns its raw output.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::ToolInvocation`] when the tool is not registered, or whatever
    /// the tool itself reports.
    pub async fn invoke(&self, registry: &ToolRegistry) -> Result<ToolOutput, EllError> {
        let tool = registry.require(&self.tool)?;
        tool.invoke(self.params.clone()).await
    }

    /// Invokes the tool with the correlation id attached and wraps the outcome as a
    /// `tool_result` block.
    ///
    /// The id is passed under [`TOOL_CALL_ID_PARAM`] when the parameters are a JSON
    /// object.
    ///
    /// # Errors
    ///
    /// Same as [`ToolCall::invoke`], plus [`EllError::InvalidContent`] when the output
    /// cannot be coerced into content.
    pub async fn invoke_as_block(&self, registry: &ToolRegistry) -> Result<ContentBlock, EllError> {
        let tool = registry.require(&self.tool)?;
        let output = tool.invoke(self.params_with_id()).await?;
        let result = output.into_tool_result(self.tool_call_id.clone())?;
        Ok(ContentBlock::ToolResult(result))
    }

    /// Invokes the tool and wraps the result in a single-block `user` message.
    pub async fn call_and_collect_as_message(
        &self,
        registry: &ToolRegistry,
    ) -> Result<Message, EllError> {
        let block = self.invoke_as_block(registry).await?;
        Message::from_blocks(Role::User, vec![block])
    }

    fn params_with_id(&self) -> Value {
        match (&self.params, &self.tool_call_id) {
            (Value::Object(map), Some(id)) => {
                let mut map = map.clone();
                map.insert(TOOL_CALL_ID_PARAM.to_string(), Value::String(id.clone()));
                Value::Object(map)
            }
            (params, _) => params.clone(),
        }
    }
}

/// Outcome of a tool call, keyed by the correlation id of the originating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Correlated call identifier.
    pub tool_call_id: Option<String>,
    /// Content produced by the tool.
    pub result: Vec<ContentBlock>,
}

impl ToolResult {
    pub fn new(tool_call_id: Option<String>, result: Vec<ContentBlock>) -> Self {
        Self {
            tool_call_id,
            result,
        }
    }

    /// Builds a result holding a single text block.
    pub fn text(tool_call_id: Option<String>, text: impl Into<String>) -> Self {
        Self::new(tool_call_id, vec![ContentBlock::text(text)])
    }

    /// Renders the result blocks as text, using `<kind>` placeholders for non-text blocks.
    pub fn text_content(&self) -> String {
        render_blocks(&self.result)
    }
}

/// Declarative description of a tool, as advertised to vendors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name exposed to the model.
    pub name: String,
    /// Natural-language description of the tool purpose.
    pub description: Option<String>,
    /// Optional JSON Schema describing the input payload.
    pub parameters: Option<Value>,
}
