//! Catalog methods on LoraAtlas: registration, queries and repair passes.

use crate::artifact::{
    file_name, is_adapter_file, parse_library_path, Artifact, ExtractedArtifact, LibraryPlacement,
};
use crate::blocks::{blocks_to_csv, validate_blocks, BlockEntry, BlockWeightVector, BlocksView};
use crate::error::{AtlasError, Result};
use crate::identity::{
    needs_assignment, repair_order, AssignedIdentity, AssignmentReport, IdentityCandidate,
    IdentityFailure, StableId,
};
use crate::layout::{Classification, RawLayoutSignal};
use crate::store::{ArtifactPage, ArtifactQuery, ArtifactUpsert, IdAssignment, IndexSummary};
use crate::LoraAtlas;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// What `register_artifact` stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub artifact: Artifact,
    pub classification: Classification,
    /// Non-fatal problems: unknown layout, identity not assigned, dropped raw strengths.
    pub warnings: Vec<String>,
}

/// Summary of one layout backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub examined: usize,
    pub updated: usize,
    pub warnings: Vec<String>,
}

fn parse_stable_id(raw: &str) -> Result<StableId> {
    StableId::parse(raw)
}

impl LoraAtlas {
    // ========================================
    // Classification
    // ========================================

    /// Classify a raw layout signal without touching the catalog.
    pub fn classify_layout(&self, signal: &RawLayoutSignal) -> Classification {
        self.registry.classify(signal)
    }

    /// Codes implied by a path under the configured library root.
    pub fn placement_for(&self, file_path: &str) -> LibraryPlacement {
        match &self.library_root {
            Some(root) => parse_library_path(root, Path::new(file_path)),
            None => LibraryPlacement::default(),
        }
    }

    // ========================================
    // Registration
    // ========================================

    /// Register (or re-register) one extracted adapter.
    ///
    /// Classifies the layout, upserts the row by file path, replaces stored
    /// block weights and assigns a stable id when the artifact has none and
    /// both codes are known. Identity failures are reported as warnings.
    pub async fn register_artifact(&self, extracted: &ExtractedArtifact) -> Result<RegistrationOutcome> {
        let file_path = extracted.file_path.trim();
        if file_path.is_empty() {
            return Err(AtlasError::validation("file_path", "must be non-empty"));
        }
        if extracted.block_weights.iter().any(|w| !w.is_finite()) {
            return Err(AtlasError::validation(
                "block_weights",
                "all values must be finite numbers",
            ));
        }

        let placement = self.placement_for(file_path);
        let base = extracted.base_model_code.or(placement.base_model_code);
        let category = extracted.category_code.or(placement.category_code);

        let signal = RawLayoutSignal {
            family: base.and_then(|b| b.layout_family()),
            lora_type: extracted.lora_type.clone(),
            block_count: Some(extracted.block_weights.len()),
            declared_layout: None,
        };
        let (classification, unknown) = self.registry.classify_with_warning(&signal);

        let mut warnings = Vec::new();
        if !is_adapter_file(Path::new(file_path)) {
            warnings.push(format!("{} is not a .safetensors file", file_path));
        }
        if let Some(err) = unknown {
            warn!("{}: {}", file_path, err);
            warnings.push(err.to_string());
        }

        let raw_strengths = match &extracted.raw_strengths {
            Some(raw) if raw.len() == extracted.block_weights.len() => Some(raw.as_slice()),
            Some(raw) => {
                warnings.push(format!(
                    "raw_strengths has {} entries but block_weights has {}; raw values dropped",
                    raw.len(),
                    extracted.block_weights.len()
                ));
                None
            }
            None => None,
        };
        let blocks: Vec<BlockEntry> = extracted
            .block_weights
            .iter()
            .enumerate()
            .map(|(block_index, weight)| BlockEntry {
                block_index,
                weight: *weight,
                raw_strength: raw_strengths
                    .and_then(|raw| raw.get(block_index).copied())
                    .filter(|v| v.is_finite()),
            })
            .collect();

        let upsert = ArtifactUpsert {
            file_path: file_path.to_string(),
            filename: file_name(file_path),
            base_model_code: base,
            category_code: category,
            block_layout: classification.descriptor,
            has_block_weights: classification.has_block_weights,
            lora_type: extracted.lora_type.clone(),
            clip_contributor: extracted.resolved_clip_contributor(),
        };
        let mut artifact = self.store.upsert_artifact(&upsert, &blocks)?;

        if artifact.stable_id.is_none() {
            match (base, category) {
                (Some(_), Some(_)) => {
                    match self.store.assign_stable_id(artifact.id, artifact.stable_id.as_ref()) {
                        Ok(assignment) => artifact.stable_id = Some(assignment.into_stable_id()),
                        Err(e) if e.is_per_artifact() => {
                            warn!("Identity not assigned for {}: {}", file_path, e);
                            warnings.push(e.to_string());
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ => warnings.push(
                    "Base model or category could not be determined; stable id not assigned"
                        .to_string(),
                ),
            }
        }

        debug!(
            "Registered {} as {:?} ({})",
            file_path, artifact.stable_id, classification.descriptor
        );

        Ok(RegistrationOutcome {
            artifact,
            classification,
            warnings,
        })
    }

    /// Flag an artifact whose file is gone. The row and its id are kept.
    pub async fn mark_missing(&self, file_path: &str) -> Result<bool> {
        self.store.mark_missing(file_path.trim())
    }

    // ========================================
    // Queries
    // ========================================

    pub async fn get_artifact(&self, stable_id: &str) -> Result<Artifact> {
        let id = parse_stable_id(stable_id)?;
        self.store
            .get_artifact(&id)?
            .ok_or_else(|| AtlasError::ArtifactNotFound {
                stable_id: id.to_string(),
            })
    }

    pub async fn search_artifacts(&self, query: &ArtifactQuery) -> Result<ArtifactPage> {
        self.store.search(query)
    }

    /// Stored block rows, or the neutral fallback rows for a fallback layout.
    pub async fn get_blocks(&self, stable_id: &str) -> Result<BlocksView> {
        let artifact = self.get_artifact(stable_id).await?;
        let layout = artifact.layout();
        let stored = self.store.block_entries(artifact.id)?;

        let (blocks, fallback, fallback_reason) = if !stored.is_empty() {
            (stored, false, None)
        } else if let Some(vector) = BlockWeightVector::fallback_for(&layout) {
            let blocks = vector
                .values
                .iter()
                .enumerate()
                .map(|(block_index, weight)| BlockEntry {
                    block_index,
                    weight: *weight,
                    raw_strength: None,
                })
                .collect();
            (blocks, true, vector.fallback_reason)
        } else {
            (Vec::new(), false, None)
        };

        let validation_warnings = validate_blocks(&layout, &blocks);

        Ok(BlocksView {
            stable_id: artifact
                .stable_id
                .clone()
                .ok_or_else(|| AtlasError::ArtifactNotFound {
                    stable_id: stable_id.to_string(),
                })?,
            has_block_weights: artifact.has_block_weights,
            block_layout: layout,
            fallback,
            fallback_reason,
            blocks,
            validation_warnings,
        })
    }

    /// `block_index,weight,raw_strength` rows for one artifact.
    pub async fn export_blocks_csv(&self, stable_id: &str) -> Result<String> {
        let view = self.get_blocks(stable_id).await?;
        Ok(blocks_to_csv(&view.blocks))
    }

    pub async fn index_summary(&self) -> Result<IndexSummary> {
        self.store.index_summary()
    }

    // ========================================
    // Repair passes
    // ========================================

    /// Give every classifiable artifact a stable id matching its codes.
    ///
    /// Artifacts are processed in a deterministic order and a failure on one
    /// never stops the pass.
    pub async fn assign_stable_ids(&self) -> Result<AssignmentReport> {
        let mut report = AssignmentReport::default();
        let mut candidates = Vec::new();

        for row in self.store.list_layout_rows()? {
            let artifact = row.artifact;
            match (artifact.base_model_code, artifact.category_code) {
                (Some(base), Some(category)) => candidates.push(IdentityCandidate {
                    artifact_id: artifact.id,
                    file_path: artifact.file_path,
                    filename: artifact.filename,
                    base,
                    category,
                    current: artifact.stable_id,
                }),
                _ => report.skipped += 1,
            }
        }

        repair_order(&mut candidates);

        for candidate in candidates {
            if !needs_assignment(candidate.current.as_ref(), candidate.base, candidate.category) {
                report.kept += 1;
                continue;
            }

            match self
                .store
                .assign_stable_id(candidate.artifact_id, candidate.current.as_ref())
            {
                Ok(IdAssignment::Kept(_)) => report.kept += 1,
                Ok(IdAssignment::Issued(stable_id)) => report.assigned.push(AssignedIdentity {
                    file_path: candidate.file_path,
                    stable_id,
                    previous: candidate.current,
                }),
                Err(e) => {
                    warn!("Failed to assign stable id for {}: {}", candidate.file_path, e);
                    report.failures.push(IdentityFailure {
                        file_path: candidate.file_path,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Stable id pass: assigned={}, kept={}, skipped={}, failures={}",
            report.assigned.len(),
            report.kept,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    /// Reclassify every artifact whose stored layout is absent or not canonical.
    pub async fn backfill_layouts(&self) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        for row in self.store.list_layout_rows()? {
            report.examined += 1;
            let artifact = &row.artifact;

            let signal = RawLayoutSignal {
                family: artifact.layout_family(),
                lora_type: artifact.lora_type.clone(),
                block_count: Some(row.block_count),
                declared_layout: row.stored_layout.clone(),
            };
            let (classification, unknown) = self.registry.classify_with_warning(&signal);
            if let Some(err) = unknown {
                report.warnings.push(format!("{}: {}", artifact.file_path, err));
            }

            let canonical = classification.descriptor.to_string();
            let unchanged = row.stored_layout.as_deref() == Some(canonical.as_str())
                && artifact.has_block_weights == classification.has_block_weights;
            if unchanged {
                continue;
            }

            match self.store.update_classification(artifact.id, &classification) {
                Ok(()) => {
                    debug!(
                        "Backfilled layout for {}: {:?} -> {}",
                        artifact.file_path, row.stored_layout, canonical
                    );
                    report.updated += 1;
                }
                Err(e) => {
                    warn!("Failed to backfill layout for {}: {}", artifact.file_path, e);
                    report
                        .warnings
                        .push(format!("{}: {}", artifact.file_path, e));
                }
            }
        }

        info!(
            "Layout backfill: examined={}, updated={}",
            report.examined, report.updated
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{BaseModelCode, CategoryCode};
    use crate::layout::LayoutDescriptor;
    use tempfile::TempDir;

    async fn create_test_atlas(library: Option<&Path>) -> (TempDir, LoraAtlas) {
        let temp_dir = TempDir::new().unwrap();
        let mut builder = LoraAtlas::builder(temp_dir.path()).auto_create_dirs(true);
        if let Some(root) = library {
            builder = builder.library_root(root);
        }
        let atlas = builder.build().await.unwrap();
        (temp_dir, atlas)
    }

    #[tokio::test]
    async fn test_register_uses_library_placement() {
        let (_dir, atlas) = create_test_atlas(Some(Path::new("/lib"))).await;
        let outcome = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/lib/FLUX/01 - People/anna.safetensors".into(),
                block_weights: vec![0.2; 19],
                lora_type: Some("single transformer".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let artifact = outcome.artifact;
        assert_eq!(artifact.base_model_code, Some(BaseModelCode::Flx));
        assert_eq!(artifact.category_code, Some(CategoryCode::Ppl));
        assert_eq!(artifact.stable_id.unwrap().as_str(), "FLX-PPL-001");
        assert_eq!(artifact.block_layout, Some(LayoutDescriptor::parse("flux_transformer_19")));
        assert!(artifact.has_block_weights);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_register_without_codes_warns() {
        let (_dir, atlas) = create_test_atlas(None).await;
        let outcome = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/elsewhere/odd.safetensors".into(),
                block_weights: vec![0.5; 7],
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.artifact.stable_id.is_none());
        assert_eq!(outcome.artifact.block_layout, Some(LayoutDescriptor::Unknown));
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_register_rejects_non_finite_weights() {
        let (_dir, atlas) = create_test_atlas(None).await;
        let result = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/lib/x.safetensors".into(),
                base_model_code: Some(BaseModelCode::Flx),
                block_weights: vec![0.5, f64::NAN],
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AtlasError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_get_blocks_fallback_view() {
        let (_dir, atlas) = create_test_atlas(None).await;
        let outcome = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/lib/plain.safetensors".into(),
                base_model_code: Some(BaseModelCode::Flx),
                category_code: Some(CategoryCode::Stl),
                ..Default::default()
            })
            .await
            .unwrap();
        let id = outcome.artifact.stable_id.unwrap();

        let view = atlas.get_blocks(id.as_str()).await.unwrap();
        assert!(view.fallback);
        assert!(!view.has_block_weights);
        assert_eq!(view.blocks.len(), 16);
        assert!(view.validation_warnings.is_empty());

        let csv = atlas.export_blocks_csv(id.as_str()).await.unwrap();
        assert!(csv.starts_with("block_index,weight,raw_strength"));
        assert!(csv.contains("15,1.000000,"));
    }

    #[tokio::test]
    async fn test_identity_repair_reassigns_on_prefix_change() {
        let (_dir, atlas) = create_test_atlas(None).await;
        let first = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/lib/a.safetensors".into(),
                base_model_code: Some(BaseModelCode::Sdx),
                category_code: Some(CategoryCode::Stl),
                ..Default::default()
            })
            .await
            .unwrap();
        let old_id = first.artifact.stable_id.clone().unwrap();

        {
            let conn = atlas.store().lock().unwrap();
            conn.execute(
                "UPDATE artifacts SET category_code = 'NAT' WHERE id = ?1",
                rusqlite::params![first.artifact.id],
            )
            .unwrap();
        }

        let report = atlas.assign_stable_ids().await.unwrap();
        assert_eq!(report.assigned.len(), 1);
        assert_eq!(report.assigned[0].stable_id.as_str(), "SDX-NAT-001");
        assert_eq!(report.assigned[0].previous, Some(old_id));
        assert!(report.failures.is_empty());

        let again = atlas.assign_stable_ids().await.unwrap();
        assert!(again.assigned.is_empty());
        assert_eq!(again.kept, 1);
    }

    #[tokio::test]
    async fn test_identity_repair_continues_past_referenced_id() {
        let (_dir, atlas) = create_test_atlas(Some(Path::new("/lib"))).await;
        let register = |path: &'static str| {
            let atlas = atlas.clone();
            async move {
                atlas
                    .register_artifact(&ExtractedArtifact {
                        file_path: path.into(),
                        block_weights: vec![0.4; 19],
                        ..Default::default()
                    })
                    .await
                    .unwrap()
            }
        };

        let anchor = register("/lib/FLUX/01 - People/anchor.safetensors").await;
        let anchor_id = anchor.artifact.stable_id.clone().unwrap();

        // A saved set naming FLX-STL-001 before any Styles artifact exists.
        let request = crate::CombinationRequest::new([anchor_id.as_str(), "FLX-STL-001"]);
        atlas.save_combination("holds styles slot", &request).await.unwrap();

        let blocked = register("/lib/FLUX/02 - Styles/blocked.safetensors").await;
        assert!(blocked.artifact.stable_id.is_none());
        assert!(blocked.warnings.iter().any(|w| w.contains("FLX-STL-001")));

        let cleared = register("/lib/FLUX/01 - People/cleared.safetensors").await;
        {
            let conn = atlas.store().lock().unwrap();
            conn.execute(
                "UPDATE artifacts SET stable_id = NULL WHERE id = ?1",
                rusqlite::params![cleared.artifact.id],
            )
            .unwrap();
        }

        let report = atlas.assign_stable_ids().await.unwrap();
        assert_eq!(report.kept, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].file_path,
            "/lib/FLUX/02 - Styles/blocked.safetensors"
        );
        assert!(report.failures[0].error.contains("FLX-STL-001"));
        assert_eq!(report.assigned.len(), 1);
        assert_eq!(
            report.assigned[0].file_path,
            "/lib/FLUX/01 - People/cleared.safetensors"
        );
        assert_eq!(report.assigned[0].stable_id.as_str(), "FLX-PPL-003");
    }

    #[tokio::test]
    async fn test_backfill_normalizes_stored_layouts() {
        let (_dir, atlas) = create_test_atlas(None).await;
        let outcome = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/lib/b.safetensors".into(),
                base_model_code: Some(BaseModelCode::Flx),
                category_code: Some(CategoryCode::Stl),
                block_weights: vec![0.3; 19],
                ..Default::default()
            })
            .await
            .unwrap();

        {
            let conn = atlas.store().lock().unwrap();
            conn.execute(
                "UPDATE artifacts SET block_layout = NULL, has_block_weights = 0 WHERE id = ?1",
                rusqlite::params![outcome.artifact.id],
            )
            .unwrap();
        }

        let report = atlas.backfill_layouts().await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.updated, 1);

        let artifact = atlas
            .get_artifact(outcome.artifact.stable_id.unwrap().as_str())
            .await
            .unwrap();
        assert_eq!(artifact.block_layout, Some(LayoutDescriptor::parse("flux_transformer_19")));
        assert!(artifact.has_block_weights);

        assert_eq!(atlas.backfill_layouts().await.unwrap().updated, 0);
    }
}
