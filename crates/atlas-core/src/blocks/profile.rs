//! User-saved override vectors.

use crate::error::{AtlasError, Result};
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockProfile {
    pub id: i64,
    pub stable_id: StableId,
    pub profile_name: String,
    pub block_weights: Vec<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub block_weights: Option<Vec<f64>>,
}

pub fn validate_profile_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AtlasError::validation(
            "profile_name",
            "must be non-empty",
        ));
    }
    Ok(trimmed.to_string())
}

/// Weights must be finite and, when the layout is known, match its block count.
pub fn validate_profile_weights(layout: &LayoutDescriptor, weights: &[f64]) -> Result<()> {
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(AtlasError::validation(
            "block_weights",
            "all values must be finite numbers",
        ));
    }
    if let Some(expected) = layout.expected_block_count() {
        if weights.len() != expected {
            return Err(AtlasError::validation(
                "block_weights",
                format!(
                    "length {} does not match expected {expected} for layout '{layout}'",
                    weights.len()
                ),
            ));
        }
    }
    Ok(())
}
