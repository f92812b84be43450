//! Integration tests for the LoraAtlas public interface.
//!
//! These run the whole pipeline against a temporary catalog: registration,
//! classification, identity, combination and saved configurations.

use lora_atlas::{
    AtlasError, BaseModelCode, CategoryCode, ClipStrength, CombinationRequest, ExclusionReason,
    ExtractedArtifact, LayoutDescriptor, LoraAtlas, StrengthOverride,
};
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_atlas() -> (TempDir, LoraAtlas) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let atlas = LoraAtlas::builder(temp_dir.path())
        .auto_create_dirs(true)
        .library_root("/library")
        .build()
        .await
        .unwrap();
    (temp_dir, atlas)
}

async fn register(
    atlas: &LoraAtlas,
    path: &str,
    weights: Vec<f64>,
    clip_contributor: Option<bool>,
) -> String {
    let outcome = atlas
        .register_artifact(&ExtractedArtifact {
            file_path: path.to_string(),
            block_weights: weights,
            clip_contributor,
            ..Default::default()
        })
        .await
        .unwrap();
    outcome.artifact.stable_id.unwrap().to_string()
}

fn strength(model: f64) -> StrengthOverride {
    StrengthOverride {
        strength_model: Some(model),
        ..Default::default()
    }
}

async fn scenario_pair(atlas: &LoraAtlas) -> (String, String) {
    let a = register(
        atlas,
        "/library/FLUX/01 - People/a.safetensors",
        vec![1.0, 0.9, 0.8],
        Some(true),
    )
    .await;
    let b = register(
        atlas,
        "/library/FLUX/01 - People/b.safetensors",
        vec![0.7, 0.6, 0.5],
        Some(false),
    )
    .await;
    (a, b)
}

#[tokio::test]
async fn test_api_creation_fails_for_nonexistent_path() {
    let result = LoraAtlas::new("/nonexistent/path/that/does/not/exist").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_scenario_a_cap_not_exceeded() {
    let (_dir, atlas) = create_test_atlas().await;
    let (a, b) = scenario_pair(&atlas).await;
    assert_eq!((a.as_str(), b.as_str()), ("FLX-PPL-001", "FLX-PPL-002"));

    let request = CombinationRequest::new([&a, &b])
        .with_cap(1.5)
        .with_override(&a, strength(0.8))
        .with_override(&b, strength(0.6));
    let result = atlas.combine_preview(&request).await.unwrap();

    assert_eq!(result.scale, 1.0);
    assert_eq!(result.validated_layout, LayoutDescriptor::parse("flux_transformer_3"));
    assert_eq!(result.per_artifact[0].strength_model, 0.8);
    assert_eq!(result.per_artifact[1].strength_model, 0.6);
    assert!((result.max_total_influence - 1.22).abs() < 1e-9);
    assert_eq!(result.peak_block, Some(0));
}

#[tokio::test]
async fn test_scenario_b_cap_exceeded() {
    let (_dir, atlas) = create_test_atlas().await;
    let (a, b) = scenario_pair(&atlas).await;

    let request = CombinationRequest::new([&a, &b])
        .with_cap(0.8)
        .with_override(&a, strength(0.8))
        .with_override(&b, strength(0.6));
    let result = atlas.combine_preview(&request).await.unwrap();

    assert!((result.scale - 0.6557).abs() < 1e-4);
    assert!((result.per_artifact[0].strength_model - 0.5246).abs() < 1e-4);
    assert!((result.per_artifact[1].strength_model - 0.3934).abs() < 1e-4);
    assert!(matches!(result.per_artifact[0].strength_clip, ClipStrength::Present(_)));
    assert_eq!(result.per_artifact[1].strength_clip, ClipStrength::Omitted);
    assert_eq!(result.per_artifact[0].block_weights, vec![1.0, 0.9, 0.8]);

    for block in 0..3 {
        let total: f64 = result
            .per_artifact
            .iter()
            .map(|p| p.strength_model * p.block_weights[block])
            .sum();
        assert!(total <= 0.8 + 1e-9);
    }
}

#[tokio::test]
async fn test_scenario_c_fallback_layout() {
    let (_dir, atlas) = create_test_atlas().await;
    let id = register(&atlas, "/library/FLUX/02 - Styles/ink.safetensors", vec![], None).await;

    let artifact = atlas.get_artifact(&id).await.unwrap();
    assert_eq!(artifact.block_layout, Some(LayoutDescriptor::FluxFallback16));
    assert!(!artifact.has_block_weights);

    let result = atlas
        .combine_preview(&CombinationRequest::new([&id]))
        .await
        .unwrap();
    assert!(result.per_artifact[0].fallback);
    assert_eq!(result.per_artifact[0].block_weights, vec![1.0; 16]);
    assert_eq!(result.per_artifact[0].strength_clip, ClipStrength::Unknown);
}

#[tokio::test]
async fn test_scenario_d_mixed_base_models() {
    let (_dir, atlas) = create_test_atlas().await;
    let a = register(&atlas, "/library/FLUX/01 - People/a.safetensors", vec![0.5; 3], None).await;
    let b = register(&atlas, "/library/SDXL/01 - People/b.safetensors", vec![0.5; 3], None).await;
    let c = register(&atlas, "/library/FLUX/01 - People/c.safetensors", vec![0.5; 3], None).await;

    let result = atlas
        .combine_preview(&CombinationRequest::new([&a, &b, &c, &"FLX-PPL-999".to_string()]))
        .await
        .unwrap();

    let ids: Vec<_> = result.per_artifact.iter().map(|p| p.stable_id.to_string()).collect();
    assert_eq!(ids, vec![a, c]);
    assert_eq!(result.validated_base_model, BaseModelCode::Flx);
    assert_eq!(result.excluded.len(), 2);
    assert_eq!(result.excluded[0].stable_id, b);
    assert_eq!(result.excluded[0].reason, ExclusionReason::IncompatibleBaseModel);
    assert_eq!(result.excluded[1].reason, ExclusionReason::NotFound);
}

#[tokio::test]
async fn test_empty_combination_and_invalid_cap() {
    let (_dir, atlas) = create_test_atlas().await;

    let err = atlas
        .combine_preview(&CombinationRequest::new(["FLX-PPL-404"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AtlasError::EmptyCombination { .. }));

    let err = atlas
        .combine_preview(&CombinationRequest::new(["FLX-PPL-404"]).with_cap(-1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AtlasError::InvalidCap { .. }));
}

#[tokio::test]
async fn test_determinism() {
    let (_dir, atlas) = create_test_atlas().await;
    let (a, b) = scenario_pair(&atlas).await;
    let request = CombinationRequest::new([&a, &b]).with_cap(0.5);

    let first = atlas.combine_preview(&request).await.unwrap();
    let second = atlas.combine_preview(&request).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_saved_configuration_is_never_recomputed() {
    let (_dir, atlas) = create_test_atlas().await;
    let (a, b) = scenario_pair(&atlas).await;
    let request = CombinationRequest::new([&a, &b]).with_cap(0.8);

    let saved = atlas.save_combination("portrait pair", &request).await.unwrap();

    // Change the stored weights after saving.
    register(
        &atlas,
        "/library/FLUX/01 - People/a.safetensors",
        vec![0.1, 0.1, 0.1],
        Some(true),
    )
    .await;

    let loaded = atlas.load_configuration(saved.id).await.unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.result.per_artifact[0].block_weights, vec![1.0, 0.9, 0.8]);

    let fresh = atlas.combine_preview(&request).await.unwrap();
    assert_ne!(fresh.scale, loaded.result.scale);

    let found = atlas.find_configurations(&[b.clone(), a.clone()]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "portrait pair");
}

#[tokio::test]
async fn test_stable_id_survives_reregistration_and_missing() {
    let (_dir, atlas) = create_test_atlas().await;
    let path = "/library/FLUX/03 - Utility/tool.safetensors";
    let id = register(&atlas, path, vec![0.4; 19], None).await;
    assert!(id.starts_with("FLX-UTL-"));

    assert!(atlas.mark_missing(path).await.unwrap());
    assert!(atlas.get_artifact(&id).await.unwrap().missing);

    let again = register(&atlas, path, vec![0.6; 19], None).await;
    assert_eq!(again, id);
    assert!(!atlas.get_artifact(&id).await.unwrap().missing);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_ids_are_unique() {
    let (_dir, atlas) = create_test_atlas().await;

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let atlas = atlas.clone();
            tokio::spawn(async move {
                register(
                    &atlas,
                    &format!("/library/FLUX/08 - Clothing/item_{i:02}.safetensors"),
                    vec![0.5; 19],
                    None,
                )
                .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }
    assert_eq!(ids.len(), 24);
    assert!(ids.contains("FLX-CLT-001"));
    assert!(ids.contains("FLX-CLT-024"));

    let counts = atlas.store().stable_id_counts().unwrap();
    assert_eq!(counts.len(), 24);
    assert!(counts.values().all(|&count| count == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_of_one_file_keeps_one_id() {
    for round in 0..20 {
        let (_dir, atlas) = create_test_atlas().await;
        let path = format!("/library/FLUX/01 - People/same_{round}.safetensors");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let atlas = atlas.clone();
                let path = path.clone();
                tokio::spawn(async move { register(&atlas, &path, vec![0.5; 19], None).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1, "round {round} handed out {ids:?}");

        let stored = atlas
            .get_artifact(ids.iter().next().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.file_path, path);

        // No orphaned reservations beyond the one issued id.
        let next = atlas
            .register_artifact(&ExtractedArtifact {
                file_path: "/library/FLUX/01 - People/other.safetensors".into(),
                block_weights: vec![0.5; 19],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(next.artifact.stable_id.unwrap().as_str(), "FLX-PPL-002");
    }
}

#[tokio::test]
async fn test_no_null_layout_after_backfill() {
    let (_dir, atlas) = create_test_atlas().await;
    register(&atlas, "/library/FLUX/02 - Styles/x.safetensors", vec![0.2; 38], None).await;
    atlas
        .register_artifact(&ExtractedArtifact {
            file_path: "/library/WAN2.2/T2V/02 - Styles/clip.safetensors".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    atlas.backfill_layouts().await.unwrap();

    let page = atlas.search_artifacts(&Default::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.results.iter().all(|a| a.block_layout.is_some()));

    let wan = page
        .results
        .iter()
        .find(|a| a.filename == "clip.safetensors")
        .unwrap();
    assert_eq!(wan.base_model_code, Some(BaseModelCode::W22));
    assert_eq!(wan.category_code, Some(CategoryCode::Stl));
    assert_eq!(wan.block_layout, Some(LayoutDescriptor::Unknown));

    let summary = atlas.index_summary().await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.with_blocks, 1);
    assert_eq!(summary.with_stable_id, 2);
}

#[tokio::test]
async fn test_profiles_follow_artifact_layout() {
    let (_dir, atlas) = create_test_atlas().await;
    let id = register(&atlas, "/library/FLUX/02 - Styles/p.safetensors", vec![], None).await;

    let profile = atlas.create_profile(&id, "gentle", &[0.5; 16]).await.unwrap();
    assert_eq!(atlas.list_profiles(&id).await.unwrap(), vec![profile]);

    let err = atlas.create_profile(&id, "wrong", &[0.5; 4]).await.unwrap_err();
    assert!(matches!(err, AtlasError::Validation { .. }));

    let next = register(&atlas, "/library/FLUX/02 - Styles/q.safetensors", vec![], None).await;
    assert_ne!(next, id);
}
