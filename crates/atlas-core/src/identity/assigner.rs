//! Sequence allocation for stable identifiers.
//!
//! The next id for a `(base, category)` pair is the smallest sequence at or
//! above the first sequence that is not already issued. Issued includes ids
//! that were retired but reserved, so a freed id is never handed to a
//! different artifact while a saved configuration or profile still names it.

use super::stable_id::StableId;
use crate::artifact::{BaseModelCode, CategoryCode};
use crate::config::IdentityConfig;
use crate::error::{AtlasError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Pick the next free id for `(base, category)`.
///
/// `existing` holds every id issued so far. `referenced` holds ids named by
/// saved configuration sets or block profiles; allocating one of those is a
/// `DuplicateIdentity` error.
pub fn next_stable_id(
    base: BaseModelCode,
    category: CategoryCode,
    existing: &HashSet<StableId>,
    referenced: &HashSet<StableId>,
) -> Result<StableId> {
    let used: BTreeSet<u32> = existing
        .iter()
        .filter(|id| id.matches(base, category))
        .map(StableId::sequence)
        .collect();

    let mut sequence = IdentityConfig::FIRST_SEQUENCE;
    while used.contains(&sequence) {
        sequence = sequence.checked_add(1).ok_or_else(|| {
            AtlasError::Other(format!(
                "Stable id sequence exhausted for {}",
                StableId::prefix_for(base, category)
            ))
        })?;
    }

    let candidate = StableId::new(base, category, sequence);
    if referenced.contains(&candidate) {
        return Err(AtlasError::DuplicateIdentity {
            stable_id: candidate.to_string(),
        });
    }
    Ok(candidate)
}

/// Whether an artifact's current id must be (re)issued.
///
/// Ids that already match the artifact's classification are kept.
pub fn needs_assignment(
    current: Option<&StableId>,
    base: BaseModelCode,
    category: CategoryCode,
) -> bool {
    current.map_or(true, |id| !id.matches(base, category))
}

/// Artifact eligible for the identity repair pass.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityCandidate {
    pub artifact_id: i64,
    pub file_path: String,
    pub filename: String,
    pub base: BaseModelCode,
    pub category: CategoryCode,
    pub current: Option<StableId>,
}

/// Deterministic repair order: base, then category, then file name.
pub fn repair_order(candidates: &mut [IdentityCandidate]) {
    candidates.sort_by(|a, b| {
        (a.base, a.category, a.filename.as_str(), a.file_path.as_str()).cmp(&(
            b.base,
            b.category,
            b.filename.as_str(),
            b.file_path.as_str(),
        ))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedIdentity {
    pub file_path: String,
    pub stable_id: StableId,
    pub previous: Option<StableId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFailure {
    pub file_path: String,
    pub error: String,
}

/// Summary of one identity repair pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub assigned: Vec<AssignedIdentity>,
    pub kept: usize,
    /// Artifacts without a base or category code.
    pub skipped: usize,
    pub failures: Vec<IdentityFailure>,
}
