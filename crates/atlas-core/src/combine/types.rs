//! Combination request and result types.

use super::clip_strength::ClipStrength;
use super::overlap::RoleAllocation;
use crate::artifact::BaseModelCode;
use crate::config::CombineConfig;
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Caller-supplied strengths for one artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthOverride {
    #[serde(default, alias = "strength_model")]
    pub strength_model: Option<f64>,
    #[serde(default, alias = "strength_clip")]
    pub strength_clip: Option<f64>,
    #[serde(default, alias = "affect_clip")]
    pub affect_clip: Option<bool>,
}

/// Selection to combine, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinationRequest {
    /// Normalized ids: trimmed, uppercased, blanks dropped, duplicates collapsed.
    pub stable_ids: Vec<String>,
    #[serde(default)]
    pub cap: Option<f64>,
    /// Overrides keyed by normalized stable id.
    #[serde(default)]
    pub overrides: HashMap<String, StrengthOverride>,
}

impl CombinationRequest {
    pub fn new<I, S>(stable_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let stable_ids = stable_ids
            .into_iter()
            .map(|id| normalize_request_id(id.as_ref()))
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            stable_ids,
            cap: None,
            overrides: HashMap::new(),
        }
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_override(mut self, stable_id: &str, strength: StrengthOverride) -> Self {
        self.overrides
            .insert(normalize_request_id(stable_id), strength);
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, StrengthOverride>) -> Self {
        for (id, strength) in overrides {
            self.overrides.insert(normalize_request_id(&id), strength);
        }
        self
    }

    /// The cap to apply, falling back to the default.
    pub fn effective_cap(&self) -> f64 {
        self.cap.unwrap_or(CombineConfig::DEFAULT_CAP)
    }

    pub fn override_for(&self, stable_id: &str) -> Option<&StrengthOverride> {
        self.overrides.get(stable_id)
    }

    /// Order-independent key used to find saved sets over the same selection.
    pub fn id_set_key(&self) -> String {
        id_set_key(&self.stable_ids)
    }
}

pub(crate) fn normalize_request_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Sorted, comma-joined id list.
pub fn id_set_key<S: AsRef<str>>(ids: &[S]) -> String {
    let mut normalized: Vec<String> = ids
        .iter()
        .map(|id| normalize_request_id(id.as_ref()))
        .filter(|id| !id.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized.join(",")
}

/// Why a requested artifact did not take part in a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    NotFound,
    IncompatibleBaseModel,
    IncompatibleLayout,
    NoUsableWeights,
    BlockCountMismatch,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::NotFound => "not_found",
            ExclusionReason::IncompatibleBaseModel => "incompatible_base_model",
            ExclusionReason::IncompatibleLayout => "incompatible_layout",
            ExclusionReason::NoUsableWeights => "no_usable_weights",
            ExclusionReason::BlockCountMismatch => "block_count_mismatch",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub stable_id: String,
    pub reason: ExclusionReason,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stable_id, self.reason)
    }
}

/// Settings for one artifact, to be applied on its own by the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactConfiguration {
    pub stable_id: StableId,
    pub strength_model: f64,
    #[serde(default, skip_serializing_if = "ClipStrength::is_unknown")]
    pub strength_clip: ClipStrength,
    pub block_weights: Vec<f64>,
    /// Comma-separated weights for loaders that take a block-weight string.
    pub block_weights_csv: String,
    /// True when `block_weights` is the neutral fallback vector.
    #[serde(default)]
    pub fallback: bool,
}

/// Full output of one combination. Persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinationResult {
    pub request_stable_ids: Vec<String>,
    pub validated_base_model: BaseModelCode,
    pub validated_layout: LayoutDescriptor,
    pub cap_used: f64,
    pub scale: f64,
    pub max_total_influence: f64,
    pub peak_block: Option<usize>,
    pub per_artifact: Vec<ArtifactConfiguration>,
    pub warnings: Vec<String>,
    pub excluded: Vec<Exclusion>,
    /// Advisory role-budgeted strengths; the applied strengths stay in `per_artifact`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_allocation: Vec<RoleAllocation>,
}

/// Render weights as a fixed-precision comma-separated list.
pub fn weights_to_csv(weights: &[f64]) -> String {
    let digits = CombineConfig::CSV_DIGITS;
    weights
        .iter()
        .map(|w| format!("{w:.digits$}"))
        .collect::<Vec<_>>()
        .join(",")
}
