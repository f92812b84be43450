//! Configuration set and block profile handlers.

use super::combine::parse_combination_request;
use super::{
    get_param, get_typed_param, parse_params, require_i64_param, require_str_param,
    require_typed_param,
};
use crate::server::AppState;
use lora_atlas::{CombinationResult, ProfileUpdate};
use serde_json::{json, Value};

/// Save either a supplied result verbatim or a freshly computed one.
///
/// With `result` present the payload is stored as given; otherwise the
/// request fields (`stable_ids`, `cap`, `overrides`) are combined first.
pub async fn save_configuration(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let name = require_str_param(params, "name", "name")?;

    let record = match get_typed_param::<CombinationResult>(params, "result", "result")? {
        Some(result) => state.atlas.save_configuration(&name, &result).await?,
        None => {
            let request = parse_combination_request(params)?;
            state.atlas.save_combination(&name, &request).await?
        }
    };
    Ok(serde_json::to_value(record)?)
}

pub async fn load_configuration(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let id = require_i64_param(params, "id", "id")?;
    let record = state.atlas.load_configuration(id).await?;
    Ok(serde_json::to_value(record)?)
}

pub async fn list_configurations(state: &AppState, _params: &Value) -> lora_atlas::Result<Value> {
    let sets = state.atlas.list_configurations().await?;
    Ok(json!({ "configurations": sets }))
}

pub async fn find_configurations(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_ids: Vec<String> = require_typed_param(params, "stable_ids", "stableIds")?;
    let sets = state.atlas.find_configurations(&stable_ids).await?;
    Ok(json!({ "configurations": sets }))
}

pub async fn delete_configuration(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let id = require_i64_param(params, "id", "id")?;
    state.atlas.delete_configuration(id).await?;
    Ok(json!({ "deleted": true, "id": id }))
}

pub async fn list_profiles(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let profiles = state.atlas.list_profiles(&stable_id).await?;
    Ok(json!({ "profiles": profiles }))
}

pub async fn create_profile(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let profile_name = require_str_param(params, "profile_name", "profileName")?;
    let block_weights: Vec<f64> = require_typed_param(params, "block_weights", "blockWeights")?;
    let profile = state
        .atlas
        .create_profile(&stable_id, &profile_name, &block_weights)
        .await?;
    Ok(serde_json::to_value(profile)?)
}

pub async fn update_profile(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let profile_id = require_i64_param(params, "profile_id", "profileId")?;
    let update: ProfileUpdate = if get_param(params, "update", "update").is_some() {
        require_typed_param(params, "update", "update")?
    } else {
        parse_params(params)?
    };
    let profile = state
        .atlas
        .update_profile(&stable_id, profile_id, &update)
        .await?;
    Ok(serde_json::to_value(profile)?)
}

pub async fn delete_profile(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let stable_id = require_str_param(params, "stable_id", "stableId")?;
    let profile_id = require_i64_param(params, "profile_id", "profileId")?;
    state.atlas.delete_profile(&stable_id, profile_id).await?;
    Ok(json!({ "deleted": true, "profileId": profile_id }))
}
