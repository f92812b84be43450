//! Layout taxonomy and classification.

mod descriptor;
mod registry;

pub use descriptor::{
    BlockKind, LayoutDescriptor, LayoutFamily, FLUX_FALLBACK_16, FLUX_FALLBACK_BLOCKS, UNET_57,
    UNET_57_BLOCKS, UNKNOWN_LAYOUT,
};
pub use registry::{
    classify, Classification, LayoutRegistry, LayoutRule, RawLayoutSignal, RULE_FAMILY_FALLBACK,
    RULE_RESERVED_NAME, RULE_STRUCTURED, RULE_UNKNOWN,
};
