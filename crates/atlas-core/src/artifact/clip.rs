//! Text-encoder contribution detection from tensor key names.

use serde::{Deserialize, Serialize};

/// Key substrings that mark a tensor as belonging to the text encoder.
const CLIP_KEY_MARKERS: &[&str] = &[
    "text_encoder",
    "text_model",
    "text_model_encoder",
    "clip",
    "te1",
    "te2",
    "lora_te1",
    "lora_te2",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipEvidence {
    pub contributor: bool,
    pub tensor_count: usize,
}

/// Count tensor keys that touch the text encoder.
pub fn detect_clip_contribution<I, S>(keys: I) -> ClipEvidence
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tensor_count = keys
        .into_iter()
        .filter(|key| {
            let lower = key.as_ref().to_lowercase();
            CLIP_KEY_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .count();

    ClipEvidence {
        contributor: tensor_count > 0,
        tensor_count,
    }
}
