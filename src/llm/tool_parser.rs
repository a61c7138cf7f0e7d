//! Parsing of Anthropic API responses
//!
//! Extracts text and tool_use blocks, then reduces a response to the single
//! value a generation request asked for.

use serde_json::Value;

use super::client::LlmError;
use super::contract::{OutputContract, extract_json};
use super::types::{CompletionResponse, StopReason, ToolCall, Usage};

/// Parse a raw Anthropic API response into a CompletionResponse
pub fn parse_response(response: &Value) -> Result<CompletionResponse, LlmError> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::InvalidResponse("response has no content array".to_string()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(text);
                }
            }
            Some("tool_use") => {
                if let Some(call) = parse_tool_use_block(block) {
                    tool_calls.push(call);
                }
            }
            _ => {}
        }
    }

    let stop_reason = response
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(parse_stop_reason)
        .unwrap_or_default();

    let usage = response.get("usage").map(parse_usage).unwrap_or_default();

    Ok(CompletionResponse {
        content,
        tool_calls,
        stop_reason,
        usage,
    })
}

fn parse_tool_use_block(block: &Value) -> Option<ToolCall> {
    let id = block.get("id").and_then(|v| v.as_str())?;
    let name = block.get("name").and_then(|v| v.as_str())?;
    let input = block.get("input").cloned().unwrap_or(Value::Object(Default::default()));
    Some(ToolCall::new(id, name, input))
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

fn parse_usage(usage: &Value) -> Usage {
    Usage::new(
        usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
    )
}

/// Reduce a response to the generated value.
///
/// With a contract, the forced tool's input wins; failing that, JSON embedded
/// in the text is used. Without a contract the text itself is the value.
/// Empty output is absence.
pub fn generated_value(response: &CompletionResponse, contract: Option<&OutputContract>) -> Option<Value> {
    match contract {
        Some(contract) => response
            .tool_calls
            .iter()
            .find(|call| call.name == contract.tool_name())
            .or_else(|| response.tool_calls.first())
            .map(|call| call.input.clone())
            .or_else(|| extract_json(&response.content)),
        None => {
            let text = response.content.trim();
            if text.is_empty() {
                None
            } else {
                Some(Value::String(text.to_string()))
            }
        }
    }
}
