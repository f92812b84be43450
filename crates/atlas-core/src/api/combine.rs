//! Combination methods on LoraAtlas.

use crate::artifact::Artifact;
use crate::blocks::BlockWeightVector;
use crate::combine::{combine, CombinationRequest, CombinationResult, CombineCandidate};
use crate::error::Result;
use crate::identity::StableId;
use crate::LoraAtlas;

impl LoraAtlas {
    /// Compute a combination without saving it.
    ///
    /// Artifacts and weight vectors are snapshotted first, then handed to the
    /// pure engine. Ids that are malformed or unknown become `not_found`
    /// exclusions.
    pub async fn combine_preview(&self, request: &CombinationRequest) -> Result<CombinationResult> {
        let mut resolved: Vec<(Option<Artifact>, Option<BlockWeightVector>)> =
            Vec::with_capacity(request.stable_ids.len());

        for raw in &request.stable_ids {
            let Ok(stable_id) = StableId::parse(raw) else {
                resolved.push((None, None));
                continue;
            };
            match self.store.artifact_snapshot(&stable_id)? {
                Some((artifact, weights)) => resolved.push((Some(artifact), weights)),
                None => resolved.push((None, None)),
            }
        }

        let candidates: Vec<CombineCandidate<'_>> = request
            .stable_ids
            .iter()
            .zip(&resolved)
            .map(|(requested_id, (artifact, weights))| CombineCandidate {
                requested_id: requested_id.as_str(),
                artifact: artifact.as_ref(),
                weights: weights.as_ref(),
            })
            .collect();

        combine(request, &candidates)
    }
}
