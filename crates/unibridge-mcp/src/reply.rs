//! Reshaping editor responses into tool results
//!
//! Tools hand agents a small JSON object rather than the raw bridge reply.
//! A failed response becomes an error result so clients can tell it apart
//! without parsing the text.

use rmcp::model::{CallToolResult, Content};
use serde_json::{Map, Value, json};
use unibridge_core::Response;

const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// `{success, message, data}` on success, `{success: false, message}` on failure
pub fn standard(response: &Response) -> Value {
    if !response.success {
        return failure(response);
    }
    json!({
        "success": true,
        "message": response.message.as_deref().unwrap_or_default(),
        "data": response.data.clone().unwrap_or(Value::Null),
    })
}

/// `{success, sceneName, hierarchyYaml}` with placeholders for missing fields
pub fn hierarchy(response: &Response) -> Value {
    if !response.success {
        return failure(response);
    }
    json!({
        "success": true,
        "sceneName": string_field(response, "sceneName").unwrap_or("Unknown"),
        "hierarchyYaml": string_field(response, "hierarchyYaml").unwrap_or_default(),
    })
}

/// Capture summary; `resolution` echoes what was requested
pub fn screenshot(response: &Response, resolution: f64) -> Value {
    if !response.success {
        return failure(response);
    }
    json!({
        "success": true,
        "message": response.message.as_deref().unwrap_or("Screenshot captured"),
        "path": response.data_field("path").cloned().unwrap_or(Value::Null),
        "absolutePath": response.data_field("absolutePath").cloned().unwrap_or(Value::Null),
        "fileName": response.data_field("fileName").cloned().unwrap_or(Value::Null),
        "captureType": response.data_field("captureType").cloned().unwrap_or(Value::Null),
        "resolution": resolution,
    })
}

fn failure(response: &Response) -> Value {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(false));
    body.insert(
        "message".to_string(),
        Value::String(response.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
    );
    // Dispatch failures carry the class in `error` and the cause in `message`
    if let Some(detail) = &response.message {
        body.insert("detail".to_string(), Value::String(detail.clone()));
    }
    Value::Object(body)
}

fn string_field<'a>(response: &'a Response, key: &str) -> Option<&'a str> {
    response.data_field(key).and_then(Value::as_str)
}

/// Wrap a reshaped body as a tool result, flagged as an error when it failed
pub fn into_result(body: Value) -> CallToolResult {
    into_result_with(body, Vec::new())
}

/// Same as [`into_result`], with extra content such as an image after the text
pub fn into_result_with(body: Value, extra: Vec<Content>) -> CallToolResult {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    let text = serde_json::to_string_pretty(&body).unwrap_or_default();

    let mut contents = vec![Content::text(text)];
    contents.extend(extra);
    if success {
        CallToolResult::success(contents)
    } else {
        CallToolResult::error(contents)
    }
}
