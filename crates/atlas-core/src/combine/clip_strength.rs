//! Three-state clip strength.
//!
//! On the wire a number is `Present`, an explicit `null` is `Omitted` (the
//! artifact must not touch the text encoder) and an absent field is `Unknown`
//! (no evidence either way). Fields holding a `ClipStrength` must carry
//! `#[serde(default, skip_serializing_if = "ClipStrength::is_unknown")]` so the
//! absent/null distinction survives a round trip.

use super::types::StrengthOverride;
use crate::config::CombineConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClipStrength {
    Present(f64),
    Omitted,
    #[default]
    Unknown,
}

impl ClipStrength {
    pub fn value(&self) -> Option<f64> {
        match self {
            ClipStrength::Present(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ClipStrength::Unknown)
    }

    /// Apply the taming scale. Only a present value changes.
    pub fn scaled(self, scale: f64) -> Self {
        match self {
            ClipStrength::Present(v) => ClipStrength::Present(v * scale),
            other => other,
        }
    }
}

impl Serialize for ClipStrength {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ClipStrength::Present(v) => serializer.serialize_f64(*v),
            ClipStrength::Omitted | ClipStrength::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ClipStrength {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<f64>::deserialize(deserializer)? {
            Some(v) => ClipStrength::Present(v),
            None => ClipStrength::Omitted,
        })
    }
}

/// Resolve the pre-taming model and clip strengths for one artifact.
///
/// Clip is omitted when the caller disables it or the artifact is known not to
/// carry text-encoder tensors; unknown evidence stays unknown.
pub fn resolve_strengths(
    strength_override: Option<&StrengthOverride>,
    clip_contributor: Option<bool>,
) -> (f64, ClipStrength) {
    let strength_model = strength_override
        .and_then(|o| o.strength_model)
        .unwrap_or(CombineConfig::DEFAULT_STRENGTH);

    let affect_clip = strength_override
        .and_then(|o| o.affect_clip)
        .unwrap_or(true);
    let explicit_clip = strength_override.and_then(|o| o.strength_clip);

    let clip = if !affect_clip || clip_contributor == Some(false) {
        ClipStrength::Omitted
    } else if let Some(value) = explicit_clip {
        ClipStrength::Present(value)
    } else if clip_contributor == Some(true) {
        ClipStrength::Present(CombineConfig::DEFAULT_CLIP_STRENGTH)
    } else {
        ClipStrength::Unknown
    };

    (strength_model, clip)
}
