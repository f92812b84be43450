//! Row and query types exchanged with the catalog store.

use crate::artifact::{Artifact, BaseModelCode, CategoryCode};
use crate::combine::CombinationResult;
use crate::config::SearchConfig;
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use serde::{Deserialize, Serialize};

/// Normalized artifact fields written on registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactUpsert {
    pub file_path: String,
    pub filename: String,
    pub base_model_code: Option<BaseModelCode>,
    pub category_code: Option<CategoryCode>,
    pub block_layout: LayoutDescriptor,
    pub has_block_weights: bool,
    pub lora_type: Option<String>,
    pub clip_contributor: Option<bool>,
}

/// Stored layout text alongside the parsed artifact, for repair passes.
#[derive(Debug, Clone)]
pub struct LayoutRow {
    pub artifact: Artifact,
    pub stored_layout: Option<String>,
    pub block_count: usize,
}

/// Catalog search filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactQuery {
    #[serde(default)]
    pub base_model_code: Option<BaseModelCode>,
    #[serde(default)]
    pub category_code: Option<CategoryCode>,
    /// Case-insensitive filename substring.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub has_blocks: Option<bool>,
    #[serde(default)]
    pub include_missing: bool,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl ArtifactQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(SearchConfig::DEFAULT_LIMIT)
            .clamp(1, SearchConfig::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPage {
    pub results: Vec<Artifact>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub total: usize,
    pub with_blocks: usize,
    pub no_blocks: usize,
    pub with_stable_id: usize,
    pub missing: usize,
}

/// A saved combination, returned exactly as it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    #[serde(flatten)]
    pub result: CombinationResult,
}

/// Listing entry for a saved combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub stable_ids: Vec<String>,
    pub validated_base_model: BaseModelCode,
    pub validated_layout: LayoutDescriptor,
}

/// Outcome of giving one artifact a stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdAssignment {
    /// The row already carried an id matching its codes.
    Kept(StableId),
    /// A fresh id was reserved and written.
    Issued(StableId),
}

impl IdAssignment {
    pub fn stable_id(&self) -> &StableId {
        match self {
            IdAssignment::Kept(id) | IdAssignment::Issued(id) => id,
        }
    }

    pub fn into_stable_id(self) -> StableId {
        match self {
            IdAssignment::Kept(id) | IdAssignment::Issued(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_paging_defaults() {
        let query = ArtifactQuery::default();
        assert_eq!(query.effective_limit(), SearchConfig::DEFAULT_LIMIT);
        assert_eq!(query.effective_offset(), 0);

        let huge = ArtifactQuery {
            limit: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(huge.effective_limit(), SearchConfig::MAX_LIMIT);
    }
}
