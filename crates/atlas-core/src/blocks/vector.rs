//! Per-block weight vectors and the source boundary that supplies them.

use crate::config::CombineConfig;
use crate::error::Result;
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use serde::{Deserialize, Serialize};

/// One stored block row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub block_index: usize,
    pub weight: f64,
    pub raw_strength: Option<f64>,
}

/// Ordered block weights for one artifact, extracted or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockWeightVector {
    pub values: Vec<f64>,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
}

impl BlockWeightVector {
    pub fn extracted(values: Vec<f64>) -> Self {
        Self {
            values,
            fallback: false,
            fallback_reason: None,
        }
    }

    /// Neutral all-ones vector for a fallback layout.
    ///
    /// Returns `None` for layouts that have no reserved fallback.
    pub fn fallback_for(layout: &LayoutDescriptor) -> Option<Self> {
        if !layout.is_fallback() {
            return None;
        }
        let count = layout.expected_block_count()?;
        Some(Self {
            values: vec![CombineConfig::NEUTRAL_WEIGHT; count],
            fallback: true,
            fallback_reason: Some(format!(
                "No stored block weights; using neutral fallback profile for layout {layout}"
            )),
        })
    }

    pub fn from_entries(entries: &[BlockEntry]) -> Self {
        Self::extracted(entries.iter().map(|e| e.weight).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the vector has exactly the layout's expected block count.
    pub fn fits(&self, layout: &LayoutDescriptor) -> bool {
        layout.expected_block_count() == Some(self.values.len())
    }
}

/// Supplies block weight vectors by stable id.
///
/// `Ok(None)` means the artifact has neither stored weights nor a fallback.
pub trait BlockWeightSource {
    fn get_block_weight_vector(&self, stable_id: &StableId) -> Result<Option<BlockWeightVector>>;
}
