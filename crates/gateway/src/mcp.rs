//! MCP over JSON-RPC 2.0 on `POST /mcp`.
//!
//! Single requests and batches are accepted. Notifications (no `id`) are
//! executed but never answered; a body that produces no responses at all
//! is acknowledged with `202 Accepted`.

use crate::{SERVER_NAME, SharedState};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rpgforge_core::error::ToolError;
use rpgforge_tools::{ToolOutput, definitions};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug)]
struct RpcFailure {
    code: i64,
    message: String,
}

fn rpc_failure(code: i64, message: impl Into<String>) -> RpcFailure {
    RpcFailure {
        code,
        message: message.into(),
    }
}

fn rpc_success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        }
    })
}

fn tool_content(output: ToolOutput) -> Value {
    let mut meta = Map::new();
    if let Some(id) = output.artifact_id {
        meta.insert("artifact_id".into(), Value::String(id));
    }
    if !output.references.is_empty() {
        meta.insert("references".into(), json!(output.references));
    }
    if !output.truncated.is_empty() {
        meta.insert("truncated".into(), json!(output.truncated));
    }
    if !output.dropped.is_empty() {
        meta.insert("dropped".into(), json!(output.dropped));
    }

    let mut result = json!({
        "content": [{ "type": "text", "text": output.text }],
    });
    if let Some(data) = output.data {
        result["structuredContent"] = data;
    }
    if !meta.is_empty() {
        result["_meta"] = Value::Object(meta);
    }
    result
}

fn tool_error_content(message: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": message }],
        "isError": true,
    })
}

async fn call_tool(state: &SharedState, params: &Map<String, Value>) -> Result<Value, RpcFailure> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_failure(INVALID_PARAMS, "Invalid params: missing tool name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    info!(tool = name, "tools/call");
    match state.dispatcher.dispatch(name, arguments).await {
        Ok(output) => Ok(tool_content(output)),
        Err(err @ (ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. })) => {
            Err(rpc_failure(INVALID_PARAMS, err.to_string()))
        }
        Err(err) => {
            warn!(tool = name, error = %err, "Tool call failed");
            Ok(tool_error_content(&err.to_string()))
        }
    }
}

async fn process_single_rpc(state: &SharedState, request: &Value) -> Option<Value> {
    let Some(obj) = request.as_object() else {
        return Some(rpc_error(Value::Null, INVALID_REQUEST, "Invalid Request"));
    };

    let id = obj.get("id").cloned();
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Some(rpc_error(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ));
    }
    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return Some(rpc_error(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request: missing method",
        ));
    };

    if method.starts_with("notifications/") {
        debug!(method, "Notification received");
        return None;
    }

    let params = obj.get("params").and_then(Value::as_object);

    let result = match method {
        "initialize" => {
            let protocol_version = params
                .and_then(|p| p.get("protocolVersion"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROTOCOL_VERSION);
            Ok(json!({
                "protocolVersion": protocol_version,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }))
        }
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": definitions() })),
        "tools/call" => match params {
            Some(params) => call_tool(state, params).await,
            None => Err(rpc_failure(INVALID_PARAMS, "Invalid params")),
        },
        _ => Err(rpc_failure(METHOD_NOT_FOUND, format!("Method not found: {method}"))),
    };

    let id = id?;
    Some(match result {
        Ok(result) => rpc_success(id, result),
        Err(err) => rpc_error(id, err.code, &err.message),
    })
}

/// `POST /mcp`
pub async fn mcp_handler(State(state): State<SharedState>, body: Bytes) -> Response {
    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return Json(rpc_error(Value::Null, PARSE_ERROR, "Parse error")).into_response(),
    };

    if let Some(batch) = parsed.as_array() {
        if batch.is_empty() {
            return Json(rpc_error(Value::Null, INVALID_REQUEST, "Invalid Request: empty batch"))
                .into_response();
        }
        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = process_single_rpc(&state, item).await {
                responses.push(response);
            }
        }
        if responses.is_empty() {
            return StatusCode::ACCEPTED.into_response();
        }
        return Json(Value::Array(responses)).into_response();
    }

    match process_single_rpc(&state, &parsed).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
