//! Non-fatal checks and CSV rendering for stored block rows.

use super::vector::BlockEntry;
use crate::config::ExportConfig;
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Block rows for one artifact as returned by `get_blocks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocksView {
    pub stable_id: StableId,
    pub has_block_weights: bool,
    pub block_layout: LayoutDescriptor,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
    pub blocks: Vec<BlockEntry>,
    pub validation_warnings: Vec<String>,
}

/// Warnings for block rows that disagree with their layout or fall outside `[0, 1]`.
///
/// Rows are expected in `block_index` order.
pub fn validate_blocks(layout: &LayoutDescriptor, blocks: &[BlockEntry]) -> Vec<String> {
    let mut warnings = Vec::new();
    if blocks.is_empty() {
        return warnings;
    }

    match layout.expected_block_count() {
        Some(expected) if expected != blocks.len() => warnings.push(format!(
            "block_layout '{layout}' expects {expected} blocks but response has {}.",
            blocks.len()
        )),
        None => warnings.push(format!(
            "block_layout is {layout} and block count {} does not match a known layout.",
            blocks.len()
        )),
        _ => {}
    }

    let start = blocks[0].block_index;
    let contiguous = blocks
        .iter()
        .enumerate()
        .all(|(offset, block)| block.block_index == start + offset);
    if !contiguous {
        warnings.push("block_index values are not contiguous; UI may display gaps.".to_string());
    }

    if blocks.iter().any(|b| !b.weight.is_finite()) {
        warnings.push("One or more block weights are non-numeric.".to_string());
    } else if blocks.iter().any(|b| !(0.0..=1.0).contains(&b.weight)) {
        warnings.push("One or more block weights fall outside [0,1].".to_string());
    }

    warnings
}

/// Render rows as `block_index,weight,raw_strength` CSV.
pub fn blocks_to_csv(blocks: &[BlockEntry]) -> String {
    let digits = ExportConfig::CSV_DIGITS;
    let mut out = String::with_capacity(32 * (blocks.len() + 1));
    out.push_str(ExportConfig::CSV_HEADER);
    out.push('\n');

    for block in blocks {
        let raw = block
            .raw_strength
            .map(|r| format!("{r:.digits$}"))
            .unwrap_or_default();
        let _ = writeln!(out, "{},{:.digits$},{}", block.block_index, block.weight, raw);
    }
    out
}
