//! Catalog handlers: classification, registration, queries and repair passes.

use super::{get_param, get_str_param, parse_params, require_str_param};
use crate::server::AppState;
use lora_atlas::layout::LayoutFamily;
use lora_atlas::{
    AtlasError, ArtifactQuery, BaseModelCode, ExtractedArtifact, RawLayoutSignal,
};
use serde_json::{json, Value};

pub async fn classify_layout(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let family = match get_str_param(params, "family", "family") {
        Some(raw) => Some(LayoutFamily::from_str(raw).ok_or_else(|| {
            AtlasError::InvalidParams {
                message: format!("Unknown layout family: {}", raw),
            }
        })?),
        None => get_str_param(params, "base_model_code", "baseModelCode")
            .and_then(BaseModelCode::from_code)
            .and_then(|code| code.layout_family()),
    };

    let block_count = match get_param(params, "block_count", "blockCount") {
        Some(value) => Some(value.as_u64().ok_or_else(|| AtlasError::InvalidParams {
            message: "block_count must be a non-negative integer".to_string(),
        })? as usize),
        None => None,
    };

    let signal = RawLayoutSignal {
        family,
        lora_type: get_str_param(params, "lora_type", "loraType").map(String::from),
        block_count,
        declared_layout: get_str_param(params, "declared_layout", "declaredLayout")
            .map(String::from),
    };

    let classification = state.atlas.classify_layout(&signal);
    Ok(serde_json::to_value(classification)?)
}

pub async fn register_artifact(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let extracted: ExtractedArtifact = parse_params(params)?;
    let outcome = state.atlas.register_artifact(&extracted).await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn mark_missing(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let file_path = require_str_param(params, "file_path", "filePath")?;
    let marked = state.atlas.mark_missing(&file_path).await?;
    Ok(json!({ "filePath": file_path, "marked": marked }))
}

pub async fn get_artifact(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let artifact = state.atlas.get_artifact(&stable_id).await?;
    Ok(serde_json::to_value(artifact)?)
}

pub async fn search_artifacts(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let query: ArtifactQuery = parse_params(params)?;
    let page = state.atlas.search_artifacts(&query).await?;
    Ok(serde_json::to_value(page)?)
}

pub async fn get_blocks(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let view = state.atlas.get_blocks(&stable_id).await?;
    Ok(serde_json::to_value(view)?)
}

pub async fn export_blocks_csv(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let csv = state.atlas.export_blocks_csv(&stable_id).await?;
    Ok(json!({
        "stableId": stable_id.trim().to_uppercase(),
        "filename": format!("{}_blocks.csv", stable_id.trim().to_uppercase()),
        "csv": csv,
    }))
}

pub async fn index_summary(state: &AppState, _params: &Value) -> lora_atlas::Result<Value> {
    let summary = state.atlas.index_summary().await?;
    Ok(serde_json::to_value(summary)?)
}

pub async fn assign_stable_ids(state: &AppState, _params: &Value) -> lora_atlas::Result<Value> {
    let report = state.atlas.assign_stable_ids().await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn backfill_layouts(state: &AppState, _params: &Value) -> lora_atlas::Result<Value> {
    let report = state.atlas.backfill_layouts().await?;
    Ok(serde_json::to_value(report)?)
}
