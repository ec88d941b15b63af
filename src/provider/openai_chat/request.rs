use serde_json::{Map, Value, json};

use crate::error::EllError;
use crate::tools::ToolRegistry;
use crate::types::{
    ApiParams, ContentBlock, Message, ResponseFormat, Role, ToolCall, ToolDefinition, ToolResult,
};

/// Request body plus the values `call_model` reports back.
#[derive(Debug)]
pub(crate) struct ChatBody {
    pub(crate) params: Map<String, Value>,
    pub(crate) stream: bool,
    pub(crate) n: u32,
    /// The reply must be decoded into a parsed block.
    pub(crate) structured: bool,
}

/// Models of the `o1` family reject streaming and system messages.
pub(crate) fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1")
}

pub(crate) fn build_chat_body(
    model: &str,
    messages: &[Message],
    api_params: &ApiParams,
    tools: Option<&ToolRegistry>,
) -> Result<ChatBody, EllError> {
    let reasoning = is_reasoning_model(model);

    // Recognized options serialize under their vendor names; `extra` is flattened in.
    let mut body = match serde_json::to_value(api_params) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(err) => {
            return Err(EllError::invalid_request(format!(
                "failed to serialize api params: {err}"
            )));
        }
    };
    body.remove("stream");
    body.remove("response_format");

    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        Value::Array(convert_messages(messages, reasoning)?),
    );

    if let Some(format) = &api_params.response_format {
        body.insert("response_format".to_string(), convert_response_format(format));
    }

    if let Some(registry) = tools.filter(|registry| !registry.is_empty()) {
        let definitions = registry.definitions();
        body.insert(
            "tools".to_string(),
            Value::Array(definitions.iter().map(convert_tool_definition).collect()),
        );
    }

    if reasoning {
        if let Some(max_tokens) = body.remove("max_tokens") {
            body.insert("max_completion_tokens".to_string(), max_tokens);
        }
        body.remove("stream_options");
    }

    let stream = api_params.stream.unwrap_or(false) && !reasoning;
    if stream {
        body.insert("stream".to_string(), Value::Bool(true));
        body.entry("stream_options")
            .or_insert_with(|| json!({ "include_usage": true }));
    }

    Ok(ChatBody {
        params: body,
        stream,
        n: api_params.n.unwrap_or(1),
        structured: api_params
            .response_format
            .as_ref()
            .is_some_and(ResponseFormat::is_structured),
    })
}

fn convert_messages(messages: &[Message], reasoning: bool) -> Result<Vec<Value>, EllError> {
    let mut converted = Vec::with_capacity(messages.len());
    for (index, message) in messages.iter().enumerate() {
        convert_message(message, reasoning, &mut converted)
            .map_err(|err| with_message_index(err, index))?;
    }
    Ok(converted)
}

fn with_message_index(err: EllError, index: usize) -> EllError {
    match err {
        EllError::InvalidRequest { message } => EllError::InvalidRequest {
            message: format!("messages[{index}]: {message}"),
        },
        other => other,
    }
}

/// Appends the vendor messages for `message`; tool results become separate `tool`
/// role messages placed before the remaining content.
fn convert_message(
    message: &Message,
    reasoning: bool,
    out: &mut Vec<Value>,
) -> Result<(), EllError> {
    let role = match message.role() {
        Role::System if reasoning => "user",
        role => role.as_str(),
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in message.content() {
        match block {
            ContentBlock::ToolCall(call) => tool_calls.push(convert_tool_call(call)?),
            ContentBlock::ToolResult(result) => out.push(convert_tool_result(result)?),
            other => parts.push(convert_content_part(other)?),
        }
    }

    if parts.is_empty() && tool_calls.is_empty() {
        return Ok(());
    }

    let mut obj = Map::new();
    obj.insert("role".to_string(), Value::String(role.to_string()));
    obj.insert(
        "content".to_string(),
        if parts.is_empty() {
            Value::Null
        } else {
            Value::Array(parts)
        },
    );
    if !tool_calls.is_empty() {
        obj.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }
    out.push(Value::Object(obj));
    Ok(())
}

fn convert_content_part(block: &ContentBlock) -> Result<Value, EllError> {
    match block {
        ContentBlock::Text(text) => Ok(json!({ "type": "text", "text": text })),
        ContentBlock::Image { image, detail } => {
            let mut image_url = Map::new();
            image_url.insert("url".to_string(), Value::String(image.to_url()));
            if let Some(detail) = detail {
                image_url.insert("detail".to_string(), Value::String(detail.as_str().to_string()));
            }
            Ok(json!({ "type": "image_url", "image_url": image_url }))
        }
        ContentBlock::Parsed(value) => Ok(json!({ "type": "text", "text": value.to_string() })),
        ContentBlock::Audio(_) => Err(EllError::invalid_request(
            "audio content is not supported by the OpenAI chat adapter",
        )),
        ContentBlock::ToolCall(_) | ContentBlock::ToolResult(_) => Err(EllError::invalid_request(
            "tool content must be converted separately",
        )),
    }
}

fn convert_tool_call(call: &ToolCall) -> Result<Value, EllError> {
    let id = call.tool_call_id.as_deref().ok_or_else(|| {
        EllError::invalid_request(format!("tool call to {} has no tool_call_id", call.tool))
    })?;
    let arguments = serde_json::to_string(&call.params)
        .map_err(|err| EllError::invalid_request(format!("invalid tool arguments: {err}")))?;
    Ok(json!({
        "id": id,
        "type": "function",
        "function": { "name": call.tool, "arguments": arguments }
    }))
}

fn convert_tool_result(result: &ToolResult) -> Result<Value, EllError> {
    let id = result
        .tool_call_id
        .as_deref()
        .ok_or_else(|| EllError::invalid_request("tool result has no tool_call_id"))?;
    if result
        .result
        .iter()
        .any(|block| matches!(block, ContentBlock::Audio(_)))
    {
        return Err(EllError::invalid_request(
            "audio content is not supported by the OpenAI chat adapter",
        ));
    }
    Ok(json!({
        "role": "tool",
        "tool_call_id": id,
        "content": result.text_content(),
    }))
}

fn convert_tool_definition(definition: &ToolDefinition) -> Value {
    let mut function = Map::new();
    function.insert("name".to_string(), Value::String(definition.name.clone()));
    if let Some(description) = &definition.description {
        function.insert("description".to_string(), Value::String(description.clone()));
    }
    function.insert(
        "parameters".to_string(),
        definition
            .parameters
            .clone()
            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
    );
    json!({ "type": "function", "function": function })
}

fn convert_response_format(format: &ResponseFormat) -> Value {
    match format {
        ResponseFormat::Text => json!({ "type": "text" }),
        ResponseFormat::JsonObject => json!({ "type": "json_object" }),
        ResponseFormat::JsonSchema {
            name,
            schema,
            strict,
        } => {
            let mut json_schema = Map::new();
            json_schema.insert("name".to_string(), Value::String(name.clone()));
            json_schema.insert("schema".to_string(), schema.clone());
            if let Some(strict) = strict {
                json_schema.insert("strict".to_string(), Value::Bool(*strict));
            }
            json!({ "type": "json_schema", "json_schema": json_schema })
        }
    }
}
