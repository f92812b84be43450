//! Ordered rule table mapping raw extraction signals to layout descriptors.
//!
//! Rules are evaluated top to bottom and the first match wins. The final
//! `unknown` outcome is not a rule: it is what classification returns when
//! nothing matched, so every signal produces a non-null descriptor.

use crate::error::AtlasError;
use crate::layout::descriptor::{BlockKind, LayoutDescriptor, LayoutFamily, UNET_57_BLOCKS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural evidence gathered for one adapter during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLayoutSignal {
    /// Architecture family implied by the base model.
    #[serde(default)]
    pub family: Option<LayoutFamily>,
    /// Free-form label describing which sub-networks the adapter touches.
    #[serde(default)]
    pub lora_type: Option<String>,
    /// Number of blocks detected in the weight tensors.
    #[serde(default)]
    pub block_count: Option<usize>,
    /// Layout string already declared for the artifact, if any.
    #[serde(default)]
    pub declared_layout: Option<String>,
}

impl RawLayoutSignal {
    pub fn new(family: Option<LayoutFamily>) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }

    pub fn with_block_count(mut self, count: usize) -> Self {
        self.block_count = Some(count);
        self
    }

    pub fn with_lora_type(mut self, lora_type: impl Into<String>) -> Self {
        self.lora_type = Some(lora_type.into());
        self
    }

    pub fn with_declared_layout(mut self, layout: impl Into<String>) -> Self {
        self.declared_layout = Some(layout.into());
        self
    }

    /// Detected block count, treating zero as "no structure".
    pub fn detected_block_count(&self) -> Option<usize> {
        self.block_count.filter(|n| *n > 0)
    }

    fn declared(&self) -> Option<LayoutDescriptor> {
        LayoutDescriptor::normalize(self.declared_layout.as_deref())
    }
}

impl fmt::Display for RawLayoutSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "family={}, lora_type={}, block_count={}, declared={}",
            self.family.map(|fam| fam.as_str()).unwrap_or("none"),
            self.lora_type.as_deref().unwrap_or("none"),
            self.block_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.declared_layout.as_deref().unwrap_or("none"),
        )
    }
}

/// Outcome of classifying one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub descriptor: LayoutDescriptor,
    /// True when the detected blocks match the descriptor's expected count.
    pub has_block_weights: bool,
    /// Name of the rule that matched, or `unknown`.
    pub rule: String,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.descriptor.is_unknown()
    }
}

/// One entry in the rule table.
pub struct LayoutRule {
    pub name: &'static str,
    matcher: fn(&RawLayoutSignal) -> Option<LayoutDescriptor>,
}

impl LayoutRule {
    pub fn evaluate(&self, signal: &RawLayoutSignal) -> Option<LayoutDescriptor> {
        (self.matcher)(signal)
    }
}

impl fmt::Debug for LayoutRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRule").field("name", &self.name).finish()
    }
}

pub const RULE_RESERVED_NAME: &str = "reserved-name";
pub const RULE_STRUCTURED: &str = "structured";
pub const RULE_FAMILY_FALLBACK: &str = "family-fallback";
pub const RULE_UNKNOWN: &str = "unknown";

static RULES: [LayoutRule; 3] = [
    LayoutRule {
        name: RULE_RESERVED_NAME,
        matcher: match_reserved_name,
    },
    LayoutRule {
        name: RULE_STRUCTURED,
        matcher: match_structured,
    },
    LayoutRule {
        name: RULE_FAMILY_FALLBACK,
        matcher: match_family_fallback,
    },
];

/// Exact reserved names take priority over any generic pattern.
fn match_reserved_name(signal: &RawLayoutSignal) -> Option<LayoutDescriptor> {
    let detected = signal.detected_block_count();

    match signal.declared() {
        Some(LayoutDescriptor::Unet57) if detected.is_none() || detected == Some(UNET_57_BLOCKS) => {
            return Some(LayoutDescriptor::Unet57)
        }
        Some(LayoutDescriptor::FluxFallback16) if detected.is_none() => {
            return Some(LayoutDescriptor::FluxFallback16)
        }
        _ => {}
    }

    if signal.family == Some(LayoutFamily::Unet) && detected == Some(UNET_57_BLOCKS) {
        return Some(LayoutDescriptor::Unet57);
    }
    None
}

fn match_structured(signal: &RawLayoutSignal) -> Option<LayoutDescriptor> {
    let block_count = signal.detected_block_count()?;
    match signal.family? {
        LayoutFamily::Flux => Some(LayoutDescriptor::Structured {
            family: LayoutFamily::Flux,
            kind: BlockKind::from_lora_type(signal.lora_type.as_deref()),
            block_count,
        }),
        // 57 blocks never reach here; the reserved rule claims them first.
        LayoutFamily::Unet => Some(LayoutDescriptor::Structured {
            family: LayoutFamily::Unet,
            kind: BlockKind::Unet,
            block_count,
        }),
    }
}

fn match_family_fallback(signal: &RawLayoutSignal) -> Option<LayoutDescriptor> {
    if signal.detected_block_count().is_some() {
        return None;
    }
    signal.family.and_then(|family| family.fallback())
}

/// Stateless classifier over the built-in rule table.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutRegistry;

impl LayoutRegistry {
    pub fn new() -> Self {
        Self
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &'static [LayoutRule] {
        &RULES
    }

    /// Classify a signal. Never fails and never returns an absent descriptor.
    pub fn classify(&self, signal: &RawLayoutSignal) -> Classification {
        for rule in self.rules() {
            if let Some(descriptor) = rule.evaluate(signal) {
                return Classification {
                    has_block_weights: has_usable_blocks(&descriptor, signal),
                    descriptor,
                    rule: rule.name.to_string(),
                };
            }
        }

        Classification {
            descriptor: LayoutDescriptor::Unknown,
            has_block_weights: false,
            rule: RULE_UNKNOWN.to_string(),
        }
    }

    /// Classify and surface an `UnknownLayout` warning when nothing matched.
    pub fn classify_with_warning(
        &self,
        signal: &RawLayoutSignal,
    ) -> (Classification, Option<AtlasError>) {
        let classification = self.classify(signal);
        let warning = classification.is_unknown().then(|| AtlasError::UnknownLayout {
            signal: signal.to_string(),
        });
        (classification, warning)
    }
}

fn has_usable_blocks(descriptor: &LayoutDescriptor, signal: &RawLayoutSignal) -> bool {
    if descriptor.is_fallback() {
        return false;
    }
    match (descriptor.expected_block_count(), signal.detected_block_count()) {
        (Some(expected), Some(detected)) => expected == detected,
        _ => false,
    }
}

/// Classify with the built-in rule table.
pub fn classify(signal: &RawLayoutSignal) -> Classification {
    LayoutRegistry::new().classify(signal)
}
