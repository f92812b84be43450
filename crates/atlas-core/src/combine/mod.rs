//! Multi-artifact combination: validation, taming and result assembly.
//!
//! Everything here is pure. Callers resolve artifacts and weight vectors up
//! front and pass read-only snapshots in.

mod clip_strength;
mod engine;
mod overlap;
mod types;
mod validator;

pub use clip_strength::{resolve_strengths, ClipStrength};
pub use engine::{check_cap, tame, TamedStrength, Taming, TamingInput};
pub use overlap::{
    allocate_role_budget, dot_overlap, energy_metrics, overlap_warnings, EnergyInput,
    EnergyMetrics, OverlapMatrix, Role, RoleAllocation,
};
pub use types::{
    id_set_key, weights_to_csv, ArtifactConfiguration, CombinationRequest, CombinationResult,
    Exclusion, ExclusionReason, StrengthOverride,
};
pub use validator::{validate_selection, CombineCandidate, EligibleArtifact, Validation};

use crate::config::CombineConfig;
use crate::error::{AtlasError, Result};
use tracing::debug;

/// Run a full combination over pre-resolved candidates.
///
/// `candidates` must follow the request's id order. The cap is checked before
/// anything else, so an invalid cap fails even when no artifact resolves.
pub fn combine(
    request: &CombinationRequest,
    candidates: &[CombineCandidate<'_>],
) -> Result<CombinationResult> {
    let cap = request.effective_cap();
    check_cap(cap)?;

    for (stable_id, strength) in &request.overrides {
        for (field, value) in [
            ("strength_model", strength.strength_model),
            ("strength_clip", strength.strength_clip),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(AtlasError::validation(
                    field,
                    format!("override for {stable_id} must be a finite number"),
                ));
            }
        }
    }

    let validation = validate_selection(candidates)?;

    let inputs: Vec<TamingInput<'_>> = validation
        .eligible
        .iter()
        .map(|eligible| {
            let (strength_model, strength_clip) = resolve_strengths(
                request.override_for(eligible.stable_id.as_str()),
                eligible.artifact.clip_contributor,
            );
            TamingInput {
                stable_id: eligible.stable_id,
                strength_model,
                strength_clip,
                weights: &eligible.weights.values,
            }
        })
        .collect();

    let taming = tame(&inputs, cap)?;

    let mut warnings: Vec<String> = validation
        .excluded
        .iter()
        .map(|e| format!("Artifact {} was excluded from combination: {}", e.stable_id, e.reason))
        .collect();

    let per_artifact: Vec<ArtifactConfiguration> = validation
        .eligible
        .iter()
        .zip(&taming.strengths)
        .map(|(eligible, tamed)| {
            if eligible.weights.fallback {
                warnings.push(format!(
                    "Artifact {} uses neutral fallback weights for layout {}",
                    eligible.stable_id, validation.validated_layout
                ));
            }
            if tamed.strength_clip.is_unknown() {
                warnings.push(format!(
                    "Text-encoder contribution of {} is unknown; strength_clip left unset",
                    eligible.stable_id
                ));
            }
            ArtifactConfiguration {
                stable_id: eligible.stable_id.clone(),
                strength_model: tamed.strength_model,
                strength_clip: tamed.strength_clip,
                block_weights: eligible.weights.values.clone(),
                block_weights_csv: weights_to_csv(&eligible.weights.values),
                fallback: eligible.weights.fallback,
            }
        })
        .collect();

    let energy: Vec<EnergyMetrics> = validation
        .eligible
        .iter()
        .zip(&inputs)
        .map(|(eligible, input)| {
            energy_metrics(&EnergyInput {
                stable_id: eligible.stable_id.as_str(),
                role: Role::for_category(eligible.artifact.category_code),
                block_weights: &eligible.weights.values,
                strength: input.strength_model,
            })
        })
        .collect();
    let overlap = OverlapMatrix::build(&energy)?;
    let threshold = CombineConfig::OVERLAP_THRESHOLD;
    warnings.extend(overlap_warnings(&energy, &overlap, threshold));
    let role_allocation = allocate_role_budget(&energy, &overlap, threshold);

    if taming.scale < 1.0 {
        warnings.push(format!(
            "Peak block influence {:.4} exceeded cap {}; strengths scaled by {:.4}",
            taming.max_total_influence, cap, taming.scale
        ));
    }

    debug!(
        "Combined {} artifacts ({} excluded), scale {}",
        per_artifact.len(),
        validation.excluded.len(),
        taming.scale
    );

    Ok(CombinationResult {
        request_stable_ids: request.stable_ids.clone(),
        validated_base_model: validation.validated_base_model,
        validated_layout: validation.validated_layout,
        cap_used: cap,
        scale: taming.scale,
        max_total_influence: taming.max_total_influence,
        peak_block: taming.peak_block,
        per_artifact,
        warnings,
        excluded: validation.excluded,
        role_allocation,
    })
}
