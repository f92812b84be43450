//! JSON-RPC request handlers, split by domain.

mod catalog;
mod combine;
mod configs;

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use lora_atlas::AtlasError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data,
            }),
            id,
        }
    }
}

/// Structured error detail for errors that carry more than a message.
fn error_data(err: &AtlasError) -> Option<Value> {
    match err {
        AtlasError::EmptyCombination { excluded } => Some(json!({ "excluded": excluded })),
        AtlasError::InvalidCap { cap } => Some(json!({ "cap": cap })),
        _ => None,
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Look up a parameter under its snake_case or camelCase name.
pub(crate) fn get_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .filter(|v| !v.is_null())
}

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    get_param(params, snake, camel).and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> lora_atlas::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| AtlasError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract a required i64 parameter or return an error.
pub(crate) fn require_i64_param(params: &Value, snake: &str, camel: &str) -> lora_atlas::Result<i64> {
    get_param(params, snake, camel)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AtlasError::InvalidParams {
            message: format!("Missing required integer parameter: {}", snake),
        })
}

/// Deserialize an optional typed parameter.
pub(crate) fn get_typed_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> lora_atlas::Result<Option<T>> {
    match get_param(params, snake, camel) {
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| AtlasError::InvalidParams {
                message: format!("Invalid parameter {}: {}", snake, e),
            }),
        None => Ok(None),
    }
}

/// Deserialize a required typed parameter.
pub(crate) fn require_typed_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> lora_atlas::Result<T> {
    get_typed_param(params, snake, camel)?.ok_or_else(|| AtlasError::InvalidParams {
        message: format!("Missing required parameter: {}", snake),
    })
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Deserialize the whole params object.
///
/// Top-level snake_case keys are rewritten to camelCase unless the camelCase
/// key is also present.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Value) -> lora_atlas::Result<T> {
    let normalized = match params {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let camel = snake_to_camel(key);
                if camel != *key && map.contains_key(&camel) {
                    continue;
                }
                out.insert(camel, value.clone());
            }
            Value::Object(out)
        }
        other => other.clone(),
    };
    serde_json::from_value(normalized).map_err(|e| AtlasError::InvalidParams {
        message: e.to_string(),
    })
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state, method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string(), error_data(&e))),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
async fn dispatch_method(state: &AppState, method: &str, params: &Value) -> lora_atlas::Result<Value> {
    match method {
        // Catalog
        "classify_layout" => catalog::classify_layout(state, params).await,
        "register_artifact" => catalog::register_artifact(state, params).await,
        "mark_missing" => catalog::mark_missing(state, params).await,
        "get_artifact" => catalog::get_artifact(state, params).await,
        "search_artifacts" => catalog::search_artifacts(state, params).await,
        "get_blocks" => catalog::get_blocks(state, params).await,
        "export_blocks_csv" => catalog::export_blocks_csv(state, params).await,
        "index_summary" => catalog::index_summary(state, params).await,
        "assign_stable_ids" => catalog::assign_stable_ids(state, params).await,
        "backfill_layouts" => catalog::backfill_layouts(state, params).await,

        // Combination
        "combine_preview" => combine::combine_preview(state, params).await,

        // Configuration sets
        "save_configuration" => configs::save_configuration(state, params).await,
        "load_configuration" => configs::load_configuration(state, params).await,
        "list_configurations" => configs::list_configurations(state, params).await,
        "find_configurations" => configs::find_configurations(state, params).await,
        "delete_configuration" => configs::delete_configuration(state, params).await,

        // Block profiles
        "list_profiles" => configs::list_profiles(state, params).await,
        "create_profile" => configs::create_profile(state, params).await,
        "update_profile" => configs::update_profile(state, params).await,
        "delete_profile" => configs::delete_profile(state, params).await,

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(AtlasError::Other(format!("Method not found: {}", method)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
