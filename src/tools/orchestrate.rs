use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::future::join_all;
use futures_util::{FutureExt, StreamExt, stream};
use tracing::{debug, warn};

use crate::error::EllError;
use crate::types::{ContentBlock, ToolCall, ToolResult};

use super::{ToolExecution, ToolRegistry};

/// Prefix of the text block recorded when a tool fails.
pub const TOOL_ERROR_PREFIX: &str = "Error:";

/// Invokes `calls` and returns one `tool_result` block per call, in call order.
///
/// Failures of individual tools are captured into their result block. Only
/// cancellation aborts the batch, in which case no blocks are returned.
pub(crate) async fn run_tool_calls(
    calls: &[&ToolCall],
    registry: &ToolRegistry,
    execution: &ToolExecution,
) -> Result<Vec<ContentBlock>, EllError> {
    let run = collect_results(calls, registry, execution);
    match &execution.cancellation {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(EllError::cancelled(format!(
                "tool execution aborted with {} call(s) pending",
                calls.len()
            ))),
            blocks = run => Ok(blocks),
        },
        None => Ok(run.await),
    }
}

async fn collect_results(
    calls: &[&ToolCall],
    registry: &ToolRegistry,
    execution: &ToolExecution,
) -> Vec<ContentBlock> {
    if !execution.parallel {
        let mut blocks = Vec::with_capacity(calls.len());
        for call in calls {
            blocks.push(invoke_captured(call, registry).await);
        }
        return blocks;
    }

    let invocations = calls.iter().map(|call| invoke_captured(call, registry));
    match execution.max_workers {
        // `buffered` yields in submission order regardless of completion order.
        Some(limit) => stream::iter(invocations).buffered(limit.max(1)).collect().await,
        None => join_all(invocations).await,
    }
}

async fn invoke_captured(call: &ToolCall, registry: &ToolRegistry) -> ContentBlock {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(call.invoke_as_block(registry))
        .catch_unwind()
        .await;
    let duration_ms = started.elapsed().as_millis() as u64;
    let tool_call_id = call.tool_call_id.as_deref().unwrap_or_default();

    let (block, is_error) = match outcome {
        Ok(Ok(block)) => (block, false),
        Ok(Err(err)) => {
            warn!(tool_call_id, tool_name = call.tool.as_str(), error = %err, "tool execution failed");
            (error_block(call, &err.to_string()), true)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(tool_call_id, tool_name = call.tool.as_str(), panic = message.as_str(), "tool panicked");
            (error_block(call, &format!("tool {} panicked: {message}", call.tool)), true)
        }
    };

    debug!(
        tool_call_id,
        tool_name = call.tool.as_str(),
        duration_ms,
        is_error,
        "tool execution finished"
    );
    block
}

fn error_block(call: &ToolCall, message: &str) -> ContentBlock {
    ContentBlock::ToolResult(ToolResult::text(
        call.tool_call_id.clone(),
        format!("{TOOL_ERROR_PREFIX} {message}"),
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
