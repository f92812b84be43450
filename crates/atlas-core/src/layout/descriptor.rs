//! Canonical block layout descriptors.
//!
//! A descriptor is either `<family>_<kind>_<blocks>` (for example
//! `flux_transformer_19`), one of the two reserved names `flux_fallback_16` and
//! `unet_57`, or `unknown`. Parsing never yields "no layout": strings outside
//! the taxonomy become [`LayoutDescriptor::Unknown`].

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Reserved descriptor for Flux adapters without usable block structure.
pub const FLUX_FALLBACK_16: &str = "flux_fallback_16";
/// Reserved descriptor for the 57-block UNet mapping.
pub const UNET_57: &str = "unet_57";
/// Marker for descriptors outside the taxonomy.
pub const UNKNOWN_LAYOUT: &str = "unknown";

pub const FLUX_FALLBACK_BLOCKS: usize = 16;
pub const UNET_57_BLOCKS: usize = 57;

/// `<family>_<kind>_<N>` with the kinds currently produced by extraction.
static STRUCTURED_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(flux|unet)_(transformer|double|te|unet)_(\d+)$").unwrap());

/// Architecture family an adapter's blocks belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutFamily {
    /// Flux-style transformer adapters.
    Flux,
    /// Diffusers UNet adapters (SD 1.x, SDXL and derivatives).
    Unet,
}

impl LayoutFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutFamily::Flux => "flux",
            LayoutFamily::Unet => "unet",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "flux" => Some(LayoutFamily::Flux),
            "unet" => Some(LayoutFamily::Unet),
            _ => None,
        }
    }

    /// The reserved descriptor used when no block structure could be extracted.
    pub fn fallback(&self) -> Option<LayoutDescriptor> {
        match self {
            LayoutFamily::Flux => Some(LayoutDescriptor::FluxFallback16),
            LayoutFamily::Unet => None,
        }
    }
}

impl fmt::Display for LayoutFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which sub-network the counted blocks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Transformer,
    Double,
    #[serde(rename = "te")]
    TextEncoder,
    Unet,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Transformer => "transformer",
            BlockKind::Double => "double",
            BlockKind::TextEncoder => "te",
            BlockKind::Unet => "unet",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transformer" => Some(BlockKind::Transformer),
            "double" => Some(BlockKind::Double),
            "te" => Some(BlockKind::TextEncoder),
            "unet" => Some(BlockKind::Unet),
            _ => None,
        }
    }

    /// Derive the kind from the extraction's free-form `lora_type` label.
    ///
    /// Labels that name no known sub-network default to `Transformer`.
    pub fn from_lora_type(lora_type: Option<&str>) -> Self {
        let label = lora_type.unwrap_or_default().trim().to_lowercase();

        if label.contains("single_transformer_blocks") {
            return BlockKind::Transformer;
        }
        if label.contains("double+single")
            || (label.contains("unet") && label.contains("double") && label.contains("single"))
        {
            return BlockKind::Double;
        }
        if label.contains("double_blocks") {
            return BlockKind::Double;
        }
        if label.contains("text_encoder") || label.contains("text-encoder") {
            return BlockKind::TextEncoder;
        }
        if label.contains("unet") {
            return BlockKind::Unet;
        }
        BlockKind::Transformer
    }
}

/// Canonical structural descriptor of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutDescriptor {
    /// `flux_fallback_16`: neutral 16-block layout for Flux adapters without blocks.
    FluxFallback16,
    /// `unet_57`: the 57-block diffusers UNet mapping.
    Unet57,
    /// `<family>_<kind>_<block_count>`.
    Structured {
        family: LayoutFamily,
        kind: BlockKind,
        block_count: usize,
    },
    /// Outside the taxonomy.
    Unknown,
}

impl LayoutDescriptor {
    /// Parse a descriptor string. Anything outside the taxonomy is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            FLUX_FALLBACK_16 => return LayoutDescriptor::FluxFallback16,
            UNET_57 => return LayoutDescriptor::Unet57,
            _ => {}
        }

        let Some(caps) = STRUCTURED_LAYOUT.captures(&normalized) else {
            return LayoutDescriptor::Unknown;
        };

        let family = LayoutFamily::from_str(&caps[1]);
        let kind = BlockKind::from_str(&caps[2]);
        let block_count = caps[3].parse::<usize>().ok().filter(|n| *n > 0);

        match (family, kind, block_count) {
            (Some(family), Some(kind), Some(block_count)) => LayoutDescriptor::Structured {
                family,
                kind,
                block_count,
            },
            _ => LayoutDescriptor::Unknown,
        }
    }

    /// Normalize an optional stored layout string.
    ///
    /// Returns `None` only when nothing was stored at all.
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
    }

    /// Number of blocks a weight vector for this layout must have.
    pub fn expected_block_count(&self) -> Option<usize> {
        match self {
            LayoutDescriptor::FluxFallback16 => Some(FLUX_FALLBACK_BLOCKS),
            LayoutDescriptor::Unet57 => Some(UNET_57_BLOCKS),
            LayoutDescriptor::Structured { block_count, .. } => Some(*block_count),
            LayoutDescriptor::Unknown => None,
        }
    }

    pub fn family(&self) -> Option<LayoutFamily> {
        match self {
            LayoutDescriptor::FluxFallback16 => Some(LayoutFamily::Flux),
            LayoutDescriptor::Unet57 => Some(LayoutFamily::Unet),
            LayoutDescriptor::Structured { family, .. } => Some(*family),
            LayoutDescriptor::Unknown => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LayoutDescriptor::FluxFallback16)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, LayoutDescriptor::Unknown)
    }

    /// Whether the descriptor is one of the two reserved canonical names.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            LayoutDescriptor::FluxFallback16 | LayoutDescriptor::Unet57
        )
    }
}

impl fmt::Display for LayoutDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDescriptor::FluxFallback16 => f.write_str(FLUX_FALLBACK_16),
            LayoutDescriptor::Unet57 => f.write_str(UNET_57),
            LayoutDescriptor::Structured {
                family,
                kind,
                block_count,
            } => write!(f, "{}_{}_{}", family.as_str(), kind.as_str(), block_count),
            LayoutDescriptor::Unknown => f.write_str(UNKNOWN_LAYOUT),
        }
    }
}

impl Serialize for LayoutDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LayoutDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(LayoutDescriptor::parse(&raw))
    }
}
