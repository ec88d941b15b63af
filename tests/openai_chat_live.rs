use std::env;
use std::sync::{Arc, Mutex};

use dotenvy::dotenv;
use ell_core::http::reqwest::ReqwestTransport;
use ell_core::provider::openai_chat::OpenAiClient;
use ell_core::{
    ApiParams, CompletionRequest, EllError, FunctionTool, ProviderRegistry, ResponseLogger,
    ToolOutput, ToolRegistry, system, user,
};
use serde_json::{Value, json};

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn live_client() -> Option<(OpenAiClient, String)> {
    let _ = dotenv();

    let Some(endpoint) = load_env_var("OPENAI_CHAT_ENDPOINT") else {
        eprintln!("skip live test: OPENAI_CHAT_ENDPOINT missing");
        return None;
    };
    let Some(api_key) = load_env_var("OPENAI_CHAT_KEY") else {
        eprintln!("skip live test: OPENAI_CHAT_KEY missing");
        return None;
    };
    let Some(model) = load_env_var("OPENAI_CHAT_MODEL") else {
        eprintln!("skip live test: OPENAI_CHAT_MODEL missing");
        return None;
    };

    let transport = Arc::new(ReqwestTransport::default_client().expect("http client"));
    Some((OpenAiClient::new(transport, api_key).with_base_url(endpoint), model))
}

#[tokio::test]
#[ignore = "requires valid OpenAI-compatible endpoint"]
async fn openai_chat_live_sync_and_stream() {
    let Some((client, model)) = live_client() else {
        return;
    };
    let registry = ProviderRegistry::with_defaults();
    let messages = vec![
        system("You are a helpful assistant.").unwrap(),
        user("Please introduce Rust language in one sentence.").unwrap(),
    ];

    let (replies, metadata) = registry
        .complete(
            &client,
            CompletionRequest::new(&model, &messages).with_origin("live.sync"),
        )
        .await
        .expect("chat request should succeed");
    assert!(!replies[0].text().is_empty(), "reply should contain text");
    assert!(metadata.usage.is_some());

    let params = ApiParams {
        stream: Some(true),
        ..Default::default()
    };
    let chunks = Mutex::new(0usize);
    let logger = |_choice: usize, _text: &str| *chunks.lock().unwrap() += 1;
    let logger: &dyn ResponseLogger = &logger;
    let (replies, _) = registry
        .complete(
            &client,
            CompletionRequest::new(&model, &messages)
                .with_params(&params)
                .with_origin("live.stream")
                .with_logger(logger),
        )
        .await
        .expect("streaming chat should succeed");
    assert!(!replies[0].text().is_empty());
    assert!(*chunks.lock().unwrap() > 0, "stream should yield at least one chunk");
}

#[tokio::test]
#[ignore = "requires valid OpenAI-compatible endpoint with tool support"]
async fn openai_chat_live_tool_round_trip() {
    let Some((client, model)) = live_client() else {
        return;
    };
    let tools = ToolRegistry::new().with_tool(
        FunctionTool::new("add", |params: Value| async move {
            let a = params["a"].as_i64().unwrap_or_default();
            let b = params["b"].as_i64().unwrap_or_default();
            Ok::<_, EllError>(ToolOutput::from((a + b).to_string()))
        })
        .with_description("Adds two integers")
        .with_parameters(json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        }))
        .into_dyn(),
    );
    let registry = ProviderRegistry::with_defaults();
    let mut messages = vec![user("Use the add tool to compute 2 + 3.").unwrap()];

    let (replies, _) = registry
        .complete(&client, CompletionRequest::new(&model, &messages).with_tools(&tools))
        .await
        .expect("tool request should succeed");
    let reply = replies.into_iter().next().expect("one choice");
    let Some(calls) = reply.tool_calls() else {
        eprintln!("model answered without calling a tool: {}", reply.text());
        return;
    };
    assert_eq!(calls[0].tool, "add");

    let results = reply
        .call_tools_and_collect_as_message(&tools, true)
        .await
        .expect("tool results");
    messages.push(reply);
    messages.push(results);

    let (replies, _) = registry
        .complete(&client, CompletionRequest::new(&model, &messages).with_tools(&tools))
        .await
        .expect("follow-up should succeed");
    assert!(replies[0].text().contains('5'), "{}", replies[0].text());
}
