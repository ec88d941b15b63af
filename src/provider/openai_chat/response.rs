use serde_json::{Value, json};

use crate::error::EllError;
use crate::provider::ResponseLogger;
use crate::tools::ToolRegistry;
use crate::types::{
    ContentBlock, FinishReason, Message, ProviderMetadata, ResponseMetadata, Role, TokenUsage,
    ToolCall,
};

use super::PROVIDER_NAME;
use super::types::{OpenAiChatResponse, OpenAiResponseMessage, OpenAiUsage};

/// Completion choice as accumulated from a buffered body or a stream.
#[derive(Debug, Default)]
pub(crate) struct ChoiceDraft {
    pub(crate) index: usize,
    pub(crate) text: String,
    pub(crate) refusal: Option<String>,
    pub(crate) tool_calls: Vec<ToolCallDraft>,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ToolCallDraft {
    pub(crate) id: Option<String>,
    pub(crate) name: String,
    pub(crate) arguments: String,
}

/// Vendor-neutral view of a whole response, ready to become messages.
#[derive(Debug, Default)]
pub(crate) struct ResponseDraft {
    pub(crate) id: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) usage: Option<OpenAiUsage>,
    pub(crate) choices: Vec<ChoiceDraft>,
    pub(crate) raw: Option<Value>,
}

/// Decodes a buffered chat completion body and reports each choice's text to `logger`.
pub(crate) fn decode_response(
    value: Value,
    logger: Option<&dyn ResponseLogger>,
) -> Result<ResponseDraft, EllError> {
    let response: OpenAiChatResponse = serde_json::from_value(value.clone()).map_err(|err| {
        EllError::response_decode(PROVIDER_NAME, format!("failed to parse chat completion: {err}"))
    })?;

    let mut choices: Vec<ChoiceDraft> = response
        .choices
        .into_iter()
        .map(|choice| {
            let mut draft = choice
                .message
                .map(choice_from_message)
                .unwrap_or_default();
            draft.index = choice.index;
            draft.finish_reason = choice.finish_reason;
            draft
        })
        .collect();
    choices.sort_by_key(|choice| choice.index);

    if let Some(logger) = logger {
        for choice in choices.iter().filter(|choice| !choice.text.is_empty()) {
            logger.log_text(choice.index, &choice.text);
        }
    }

    Ok(ResponseDraft {
        id: response.id,
        model: response.model,
        usage: response.usage,
        choices,
        raw: Some(value),
    })
}

fn choice_from_message(message: OpenAiResponseMessage) -> ChoiceDraft {
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|call| call.kind == "function")
        .map(|call| {
            let (name, arguments) = call
                .function
                .map(|function| {
                    (
                        function.name.unwrap_or_default(),
                        function.arguments.unwrap_or_default(),
                    )
                })
                .unwrap_or_default();
            ToolCallDraft {
                id: call.id,
                name,
                arguments,
            }
        })
        .collect();
    ChoiceDraft {
        index: 0,
        text: message.content.unwrap_or_default(),
        refusal: message.refusal,
        tool_calls,
        finish_reason: None,
    }
}

/// Turns a decoded response into one assistant message per choice plus metadata.
pub(crate) fn assemble(
    draft: ResponseDraft,
    structured: bool,
    tools: Option<&ToolRegistry>,
    invocation_origin: &str,
    endpoint: Option<String>,
) -> Result<(Vec<Message>, ResponseMetadata), EllError> {
    let mut finish_reasons = Vec::with_capacity(draft.choices.len());
    let mut messages = Vec::with_capacity(draft.choices.len());
    for choice in draft.choices {
        finish_reasons.push(choice.finish_reason.as_deref().map(convert_finish_reason));
        let index = choice.index;
        let message = choice_into_message(choice, structured, tools).map_err(|err| match err {
            EllError::ResponseDecode { provider, message } => EllError::ResponseDecode {
                provider,
                message: format!("choices[{index}]: {message}"),
            },
            other => other,
        })?;
        messages.push(message);
    }

    let metadata = ResponseMetadata {
        model: draft.model,
        usage: draft.usage.map(convert_usage),
        finish_reasons,
        invocation_origin: invocation_origin.to_string(),
        provider: ProviderMetadata {
            provider: PROVIDER_NAME.to_string(),
            request_id: draft.id,
            endpoint,
            raw: draft.raw,
        },
    };
    Ok((messages, metadata))
}

fn choice_into_message(
    choice: ChoiceDraft,
    structured: bool,
    tools: Option<&ToolRegistry>,
) -> Result<Message, EllError> {
    let mut blocks = Vec::new();

    if !choice.text.is_empty() {
        if structured {
            let value: Value = serde_json::from_str(&choice.text).map_err(|err| {
                EllError::response_decode(
                    PROVIDER_NAME,
                    format!("structured output is not valid JSON: {err}"),
                )
            })?;
            blocks.push(ContentBlock::Parsed(value));
        } else {
            blocks.push(ContentBlock::Text(choice.text));
        }
    }

    if let Some(refusal) = choice.refusal.filter(|refusal| !refusal.is_empty()) {
        blocks.push(ContentBlock::Text(refusal));
    }

    for call in choice.tool_calls {
        blocks.push(ContentBlock::ToolCall(convert_tool_call(call, tools)?));
    }

    if blocks.is_empty() {
        if structured {
            return Err(EllError::response_decode(
                PROVIDER_NAME,
                "structured output requested but the response is empty",
            ));
        }
        blocks.push(ContentBlock::text(""));
    }

    Message::from_blocks(Role::Assistant, blocks)
}

fn convert_tool_call(call: ToolCallDraft, tools: Option<&ToolRegistry>) -> Result<ToolCall, EllError> {
    if !tools.is_some_and(|registry| registry.contains(&call.name)) {
        return Err(EllError::response_decode(
            PROVIDER_NAME,
            format!("model called unknown tool {:?}", call.name),
        ));
    }
    let params = if call.arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&call.arguments).map_err(|err| {
            EllError::response_decode(
                PROVIDER_NAME,
                format!("arguments for tool {} are not valid JSON: {err}", call.name),
            )
        })?
    };
    let mut tool_call = ToolCall::new(call.name, params);
    tool_call.tool_call_id = call.id;
    Ok(tool_call)
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

pub(crate) fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        details: usage
            .completion_tokens_details
            .map(|details| details.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ToolOutput};
    use std::sync::Mutex;

    fn tools() -> ToolRegistry {
        ToolRegistry::new().with_tool(
            FunctionTool::new("get_weather", |_params: Value| async {
                Ok::<_, EllError>(ToolOutput::from("sunny"))
            })
            .into_dyn(),
        )
    }

    fn completion(choices: Value) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-2024-08-06",
            "choices": choices,
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[test]
    fn one_message_per_choice_with_metadata() {
        let body = completion(json!([
            {"index": 1, "message": {"role": "assistant", "content": "second"}, "finish_reason": "length"},
            {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"}
        ]));
        let seen = Mutex::new(Vec::new());
        let logger = |choice: usize, text: &str| seen.lock().unwrap().push((choice, text.to_string()));
        let logger: &dyn ResponseLogger = &logger;
        let draft = decode_response(body, Some(logger)).unwrap();
        let (messages, metadata) = assemble(draft, false, None, "app.greet", Some("endpoint".into())).unwrap();

        let texts: Vec<String> = messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(messages.iter().all(|message| message.role() == Role::Assistant));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, "first".to_string()), (1, "second".to_string())]
        );
        assert_eq!(metadata.model.as_deref(), Some("gpt-4o-2024-08-06"));
        assert_eq!(metadata.usage.unwrap().total_tokens, Some(15));
        assert_eq!(
            metadata.finish_reasons,
            vec![Some(FinishReason::Stop), Some(FinishReason::Length)]
        );
        assert_eq!(metadata.invocation_origin, "app.greet");
        assert_eq!(metadata.provider.request_id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(metadata.provider.endpoint.as_deref(), Some("endpoint"));
    }

    #[test]
    fn tool_calls_are_checked_against_the_catalog() {
        let body = completion(json!([{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}}
            ]},
            "finish_reason": "tool_calls"
        }]));

        let (messages, _) =
            assemble(decode_response(body.clone(), None).unwrap(), false, Some(&tools()), "", None)
                .unwrap();
        let calls = messages[0].tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "get_weather");
        assert_eq!(calls[0].params, json!({"city": "Paris"}));
        assert_eq!(calls[0].tool_call_id.as_deref(), Some("call_1"));

        let err = assemble(decode_response(body, None).unwrap(), false, None, "", None).unwrap_err();
        match err {
            EllError::ResponseDecode { message, .. } => {
                assert!(message.starts_with("choices[0]:"), "{message}");
                assert!(message.contains("get_weather"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn structured_output_becomes_parsed_block() {
        let body = completion(json!([{
            "index": 0,
            "message": {"role": "assistant", "content": "{\"name\":\"Ada\",\"age\":36}"},
            "finish_reason": "stop"
        }]));
        let (messages, _) =
            assemble(decode_response(body, None).unwrap(), true, None, "", None).unwrap();
        assert_eq!(
            messages[0].content(),
            &[ContentBlock::Parsed(json!({"name": "Ada", "age": 36}))]
        );

        let bad = completion(json!([{
            "index": 0,
            "message": {"role": "assistant", "content": "not json"},
            "finish_reason": "stop"
        }]));
        assert!(matches!(
            assemble(decode_response(bad, None).unwrap(), true, None, "", None),
            Err(EllError::ResponseDecode { .. })
        ));
    }

    #[test]
    fn empty_choice_yields_empty_text_block() {
        let body = completion(json!([{"index": 0, "message": {"role": "assistant", "content": null}}]));
        let (messages, metadata) =
            assemble(decode_response(body, None).unwrap(), false, None, "", None).unwrap();
        assert_eq!(messages[0].content(), &[ContentBlock::text("")]);
        assert_eq!(metadata.finish_reasons, vec![None]);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            decode_response(json!({"choices": "nope"}), None),
            Err(EllError::ResponseDecode { provider: "openai_chat", .. })
        ));
    }

    #[test]
    fn finish_reasons_map_to_known_variants() {
        assert_eq!(convert_finish_reason("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(
            convert_finish_reason("function_call"),
            FinishReason::Other("function_call".into())
        );
    }
}
