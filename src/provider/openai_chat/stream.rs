use std::collections::BTreeMap;

use futures_util::StreamExt;

use crate::error::EllError;
use crate::http::HttpBodyStream;
use crate::provider::ResponseLogger;
use crate::stream::{StreamDecoder, StreamEvent};

use super::PROVIDER_NAME;
use super::response::{ChoiceDraft, ResponseDraft, ToolCallDraft};
use super::types::{OpenAiStreamChunk, OpenAiToolCallDelta};

/// Reads an SSE chat completion stream to the end and folds the deltas into
/// per-choice drafts. Text deltas are forwarded to `logger` as they arrive.
pub(crate) async fn aggregate_stream(
    body: HttpBodyStream,
    logger: Option<&dyn ResponseLogger>,
) -> Result<ResponseDraft, EllError> {
    let mut decoder = StreamDecoder::new(body, PROVIDER_NAME);
    let mut aggregator = StreamAggregator::default();

    while let Some(event) = decoder.next().await {
        match event? {
            StreamEvent::Data(data) => {
                let chunk: OpenAiStreamChunk = serde_json::from_str(&data).map_err(|err| {
                    EllError::response_decode(
                        PROVIDER_NAME,
                        format!("failed to parse stream chunk: {err}"),
                    )
                })?;
                aggregator.apply(chunk, logger);
            }
            StreamEvent::Done => break,
        }
    }

    Ok(aggregator.finish())
}

#[derive(Default)]
struct StreamAggregator {
    id: Option<String>,
    model: Option<String>,
    usage: Option<super::types::OpenAiUsage>,
    choices: BTreeMap<usize, ChoiceAccumulator>,
}

#[derive(Default)]
struct ChoiceAccumulator {
    draft: ChoiceDraft,
    // Keyed by the vendor's tool call index, which is stable across deltas.
    tool_calls: BTreeMap<usize, ToolCallDraft>,
}

impl StreamAggregator {
    fn apply(&mut self, chunk: OpenAiStreamChunk, logger: Option<&dyn ResponseLogger>) {
        if self.id.is_none() {
            self.id = chunk.id;
        }
        if self.model.is_none() {
            self.model = chunk.model;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        for choice in chunk.choices {
            let accumulator = self.choices.entry(choice.index).or_default();
            accumulator.draft.index = choice.index;
            if choice.finish_reason.is_some() {
                accumulator.draft.finish_reason = choice.finish_reason;
            }
            let Some(delta) = choice.delta else {
                continue;
            };
            if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                if let Some(logger) = logger {
                    logger.log_text(choice.index, &text);
                }
                accumulator.draft.text.push_str(&text);
            }
            if let Some(refusal) = delta.refusal {
                accumulator
                    .draft
                    .refusal
                    .get_or_insert_with(String::new)
                    .push_str(&refusal);
            }
            for (position, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                accumulator.apply_tool_call(position, call);
            }
        }
    }

    fn finish(self) -> ResponseDraft {
        let choices = self
            .choices
            .into_values()
            .map(|mut accumulator| {
                accumulator.draft.tool_calls = accumulator.tool_calls.into_values().collect();
                accumulator.draft
            })
            .collect();
        ResponseDraft {
            id: self.id,
            model: self.model,
            usage: self.usage,
            choices,
            raw: None,
        }
    }
}

impl ChoiceAccumulator {
    fn apply_tool_call(&mut self, position: usize, delta: OpenAiToolCallDelta) {
        let entry = self
            .tool_calls
            .entry(delta.index.unwrap_or(position))
            .or_default();
        if delta.id.is_some() {
            entry.id = delta.id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }
}
