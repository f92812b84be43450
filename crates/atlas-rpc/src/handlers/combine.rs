//! Combination handlers.

use super::{get_typed_param, require_typed_param};
use crate::server::AppState;
use lora_atlas::{CombinationRequest, StrengthOverride};
use serde_json::Value;
use std::collections::HashMap;

/// Build a normalized request from `stable_ids`, `cap` and `overrides`.
pub(crate) fn parse_combination_request(params: &Value) -> lora_atlas::Result<CombinationRequest> {
    let stable_ids: Vec<String> = require_typed_param(params, "stable_ids", "stableIds")?;
    let overrides: Option<HashMap<String, StrengthOverride>> =
        get_typed_param(params, "overrides", "overrides")?;
    let cap: Option<f64> = get_typed_param(params, "cap", "cap")?;

    let mut request = CombinationRequest::new(stable_ids);
    if let Some(cap) = cap {
        request = request.with_cap(cap);
    }
    if let Some(overrides) = overrides {
        request = request.with_overrides(overrides);
    }
    Ok(request)
}

pub async fn combine_preview(state: &AppState, params: &Value) -> lora_atlas::Result<Value> {
    let request = parse_combination_request(params)?;
    let result = state.atlas.combine_preview(&request).await?;
    Ok(serde_json::to_value(result)?)
}
