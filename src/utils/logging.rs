//! Logging utilities
//!
//! Request summaries for debug logs with message content truncated

use crate::models::openai::{input_texts, OpenAIContent, OpenAIMessage, TextRequest};

/// Set to true to include full request details (tools, system prompts) in debug logs
/// Default is false to reduce log verbosity
pub const VERBOSE_REQUEST_LOGGING: bool = false;

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len).collect();
        format!("{}... ({} chars truncated)", kept, s.chars().count() - max_len)
    } else {
        s.to_string()
    }
}

/// Create a filtered version of a message for logging
fn filter_message(msg: &OpenAIMessage) -> serde_json::Value {
    let content = match &msg.content {
        Some(OpenAIContent::Text(t)) => {
            // For system messages, truncate more aggressively
            let max_len = if msg.role == "system" { 100 } else { 200 };
            serde_json::Value::String(truncate_content(t, max_len))
        }
        Some(OpenAIContent::Array(arr)) => {
            serde_json::json!(format!("[...{} content blocks]", arr.len()))
        }
        None => serde_json::Value::Null,
    };

    let mut obj = serde_json::json!({
        "role": msg.role,
        "content": content,
    });

    if let Some(tool_calls) = &msg.tool_calls {
        obj["tool_calls"] = serde_json::json!(format!("[...{} tool calls]", tool_calls.len()));
    }
    if let Some(tool_call_id) = &msg.tool_call_id {
        obj["tool_call_id"] = serde_json::json!(tool_call_id);
    }

    obj
}

fn filter_input(value: &Option<serde_json::Value>) -> serde_json::Value {
    match value {
        None => serde_json::Value::Null,
        Some(v) => {
            let texts = input_texts(v);
            match texts.as_slice() {
                [single] => serde_json::json!(truncate_content(single, 200)),
                many => serde_json::json!(format!("[...{} inputs]", many.len())),
            }
        }
    }
}

/// Create a filtered summary of a relay request for logging
/// Keeps original structure but truncates verbose content
pub fn create_request_log_summary(request: &TextRequest) -> serde_json::Value {
    if VERBOSE_REQUEST_LOGGING {
        serde_json::to_value(request).unwrap_or(serde_json::json!({"error": "serialize failed"}))
    } else {
        let filtered_messages: Vec<serde_json::Value> = request.messages.iter()
            .map(filter_message)
            .collect();

        let tools = match &request.tools {
            Some(t) if !t.is_empty() => serde_json::json!([format!("...{} tools (details truncated)", t.len())]),
            _ => serde_json::Value::Null,
        };

        serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": request.stream,
            "messages": filtered_messages,
            "prompt": filter_input(&request.prompt),
            "input": filter_input(&request.input),
            "tools": tools,
        })
    }
}
