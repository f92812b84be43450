//! Compatibility validation for a selection.
//!
//! The compatibility key is `(base_model_code, block_layout)` of the first
//! requested id that resolves to an artifact. Every resolved artifact, the key
//! artifact included, is then checked against that key and against its own
//! weights; failures become exclusions rather than errors.

use super::types::{Exclusion, ExclusionReason};
use crate::artifact::{Artifact, BaseModelCode};
use crate::blocks::BlockWeightVector;
use crate::error::{AtlasError, Result};
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use tracing::debug;

/// One requested id and whatever the catalog knows about it.
#[derive(Debug, Clone, Copy)]
pub struct CombineCandidate<'a> {
    pub requested_id: &'a str,
    pub artifact: Option<&'a Artifact>,
    pub weights: Option<&'a BlockWeightVector>,
}

/// An artifact that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct EligibleArtifact<'a> {
    pub stable_id: &'a StableId,
    pub artifact: &'a Artifact,
    pub weights: &'a BlockWeightVector,
}

#[derive(Debug, Clone)]
pub struct Validation<'a> {
    pub validated_base_model: BaseModelCode,
    pub validated_layout: LayoutDescriptor,
    pub eligible: Vec<EligibleArtifact<'a>>,
    pub excluded: Vec<Exclusion>,
}

/// Split candidates into eligible artifacts and exclusions.
///
/// Fails with `EmptyCombination` when nothing is eligible.
pub fn validate_selection<'a>(candidates: &[CombineCandidate<'a>]) -> Result<Validation<'a>> {
    let key = candidates
        .iter()
        .find_map(|c| c.artifact)
        .map(|artifact| (artifact.base_model_code, artifact.layout()));

    let mut eligible = Vec::new();
    let mut excluded = Vec::new();

    for candidate in candidates {
        let exclude = |reason| Exclusion {
            stable_id: candidate.requested_id.to_string(),
            reason,
        };

        let (Some(artifact), Some(stable_id), Some((key_base, key_layout))) = (
            candidate.artifact,
            candidate.artifact.and_then(|a| a.stable_id.as_ref()),
            key,
        ) else {
            excluded.push(exclude(ExclusionReason::NotFound));
            continue;
        };

        match check(artifact, candidate.weights, key_base, key_layout) {
            Ok(weights) => eligible.push(EligibleArtifact {
                stable_id,
                artifact,
                weights,
            }),
            Err(reason) => {
                debug!(
                    "Excluding {} from combination: {}",
                    candidate.requested_id, reason
                );
                excluded.push(exclude(reason));
            }
        }
    }

    match key {
        Some((Some(base), layout)) if !eligible.is_empty() => Ok(Validation {
            validated_base_model: base,
            validated_layout: layout,
            eligible,
            excluded,
        }),
        _ => Err(AtlasError::EmptyCombination {
            excluded: excluded.iter().map(|e| e.to_string()).collect(),
        }),
    }
}

fn check<'a>(
    artifact: &Artifact,
    weights: Option<&'a BlockWeightVector>,
    key_base: Option<BaseModelCode>,
    key_layout: LayoutDescriptor,
) -> std::result::Result<&'a BlockWeightVector, ExclusionReason> {
    if artifact.base_model_code.is_none() || artifact.base_model_code != key_base {
        return Err(ExclusionReason::IncompatibleBaseModel);
    }

    let layout = artifact.layout();
    if layout.is_unknown() || layout != key_layout {
        return Err(ExclusionReason::IncompatibleLayout);
    }

    let weights = weights
        .filter(|w| !w.is_empty())
        .ok_or(ExclusionReason::NoUsableWeights)?;

    if !weights.fits(&layout) {
        return Err(ExclusionReason::BlockCountMismatch);
    }
    Ok(weights)
}
