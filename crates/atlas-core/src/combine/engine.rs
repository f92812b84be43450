//! Taming: one uniform scale that bounds the peak combined block influence.
//!
//! `influence(j) = sum_i s_i * w_i[j]`. When the peak exceeds the cap every
//! strength is multiplied by `cap / peak`; block vectors are never rescaled.

use super::clip_strength::ClipStrength;
use crate::config::CombineConfig;
use crate::error::{AtlasError, Result};
use crate::identity::StableId;

/// Pre-taming strengths and weights for one eligible artifact.
#[derive(Debug, Clone, Copy)]
pub struct TamingInput<'a> {
    pub stable_id: &'a StableId,
    pub strength_model: f64,
    pub strength_clip: ClipStrength,
    pub weights: &'a [f64],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TamedStrength {
    pub strength_model: f64,
    pub strength_clip: ClipStrength,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Taming {
    pub scale: f64,
    pub max_total_influence: f64,
    pub peak_block: Option<usize>,
    /// Per-block influence before scaling.
    pub influence: Vec<f64>,
    /// Scaled strengths, parallel to the inputs.
    pub strengths: Vec<TamedStrength>,
}

pub fn check_cap(cap: f64) -> Result<()> {
    if !cap.is_finite() || cap <= 0.0 {
        return Err(AtlasError::InvalidCap { cap });
    }
    Ok(())
}

/// Compute the taming scale and scaled strengths.
///
/// All inputs must share one block count; a mismatch is reported as an
/// `IncompatibleArtifact` error instead of being silently truncated.
pub fn tame(inputs: &[TamingInput<'_>], cap: f64) -> Result<Taming> {
    check_cap(cap)?;

    let Some(first) = inputs.first() else {
        return Err(AtlasError::EmptyCombination { excluded: vec![] });
    };
    let blocks = first.weights.len();

    if let Some(odd) = inputs.iter().find(|i| i.weights.len() != blocks) {
        return Err(AtlasError::IncompatibleArtifact {
            stable_id: odd.stable_id.to_string(),
            reason: format!(
                "block count {} differs from {} in this combination",
                odd.weights.len(),
                blocks
            ),
        });
    }

    let mut influence = vec![0.0_f64; blocks];
    for input in inputs {
        for (total, weight) in influence.iter_mut().zip(input.weights) {
            *total += input.strength_model * weight;
        }
    }

    let mut peak_block = None;
    let mut max_total = 0.0_f64;
    for (index, total) in influence.iter().enumerate() {
        if peak_block.is_none() || *total > max_total {
            peak_block = Some(index);
            max_total = *total;
        }
    }

    let scale = if max_total <= cap + CombineConfig::FLOAT_TOLERANCE || max_total == 0.0 {
        1.0
    } else {
        cap / max_total
    };

    let strengths = inputs
        .iter()
        .map(|input| TamedStrength {
            strength_model: input.strength_model * scale,
            strength_clip: input.strength_clip.scaled(scale),
        })
        .collect();

    Ok(Taming {
        scale,
        max_total_influence: max_total,
        peak_block,
        influence,
        strengths,
    })
}
