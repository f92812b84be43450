//! Catalog artifact types and the closed code tables for base models and categories.

use crate::identity::StableId;
use crate::layout::{LayoutDescriptor, LayoutFamily};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-letter base model code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BaseModelCode {
    Flx,
    Flk,
    Ill,
    Pny,
    Sd1,
    Sdx,
    W21,
    W22,
}

impl BaseModelCode {
    pub const ALL: [BaseModelCode; 8] = [
        BaseModelCode::Flx,
        BaseModelCode::Flk,
        BaseModelCode::Ill,
        BaseModelCode::Pny,
        BaseModelCode::Sd1,
        BaseModelCode::Sdx,
        BaseModelCode::W21,
        BaseModelCode::W22,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseModelCode::Flx => "FLX",
            BaseModelCode::Flk => "FLK",
            BaseModelCode::Ill => "ILL",
            BaseModelCode::Pny => "PNY",
            BaseModelCode::Sd1 => "SD1",
            BaseModelCode::Sdx => "SDX",
            BaseModelCode::W21 => "W21",
            BaseModelCode::W22 => "W22",
        }
    }

    /// Library folder name this code is read from.
    pub fn folder_name(&self) -> &'static str {
        match self {
            BaseModelCode::Flx => "FLUX",
            BaseModelCode::Flk => "Flux Krea",
            BaseModelCode::Ill => "Illustrious",
            BaseModelCode::Pny => "PONY",
            BaseModelCode::Sd1 => "SD",
            BaseModelCode::Sdx => "SDXL",
            BaseModelCode::W21 => "WAN2.1",
            BaseModelCode::W22 => "WAN2.2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    pub fn from_folder(folder: &str) -> Option<Self> {
        let folder = folder.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.folder_name().eq_ignore_ascii_case(folder))
    }

    /// Layout family adapters for this base model belong to.
    ///
    /// Video models have no block mapping and return `None`.
    pub fn layout_family(&self) -> Option<LayoutFamily> {
        match self {
            BaseModelCode::Flx | BaseModelCode::Flk => Some(LayoutFamily::Flux),
            BaseModelCode::Sdx | BaseModelCode::Ill | BaseModelCode::Pny | BaseModelCode::Sd1 => {
                Some(LayoutFamily::Unet)
            }
            BaseModelCode::W21 | BaseModelCode::W22 => None,
        }
    }

    /// Whether the library nests a generation-mode folder under this base.
    pub fn has_mode_folders(&self) -> bool {
        matches!(self, BaseModelCode::W21 | BaseModelCode::W22)
    }
}

impl fmt::Display for BaseModelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Three-letter content category code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryCode {
    Ppl,
    Stl,
    Utl,
    Act,
    Bdy,
    Cht,
    Mcv,
    Clt,
    Anm,
    Bld,
    Nat,
}

impl CategoryCode {
    pub const ALL: [CategoryCode; 11] = [
        CategoryCode::Ppl,
        CategoryCode::Stl,
        CategoryCode::Utl,
        CategoryCode::Act,
        CategoryCode::Bdy,
        CategoryCode::Cht,
        CategoryCode::Mcv,
        CategoryCode::Clt,
        CategoryCode::Anm,
        CategoryCode::Bld,
        CategoryCode::Nat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryCode::Ppl => "PPL",
            CategoryCode::Stl => "STL",
            CategoryCode::Utl => "UTL",
            CategoryCode::Act => "ACT",
            CategoryCode::Bdy => "BDY",
            CategoryCode::Cht => "CHT",
            CategoryCode::Mcv => "MCV",
            CategoryCode::Clt => "CLT",
            CategoryCode::Anm => "ANM",
            CategoryCode::Bld => "BLD",
            CategoryCode::Nat => "NAT",
        }
    }

    /// Two-digit prefix of the category folder, e.g. `01` in `01 - People`.
    pub fn folder_prefix(&self) -> &'static str {
        match self {
            CategoryCode::Ppl => "01",
            CategoryCode::Stl => "02",
            CategoryCode::Utl => "03",
            CategoryCode::Act => "04",
            CategoryCode::Bdy => "05",
            CategoryCode::Cht => "06",
            CategoryCode::Mcv => "07",
            CategoryCode::Clt => "08",
            CategoryCode::Anm => "09",
            CategoryCode::Bld => "10",
            CategoryCode::Nat => "11",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryCode::Ppl => "People",
            CategoryCode::Stl => "Styles",
            CategoryCode::Utl => "Utils",
            CategoryCode::Act => "Action",
            CategoryCode::Bdy => "Body",
            CategoryCode::Cht => "Characters",
            CategoryCode::Mcv => "Machines_Vehicles",
            CategoryCode::Clt => "Clothing",
            CategoryCode::Anm => "Animals",
            CategoryCode::Bld => "Buildings",
            CategoryCode::Nat => "Nature",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    /// Resolve a category folder such as `05 - Body` by its numeric prefix.
    pub fn from_folder(folder: &str) -> Option<Self> {
        let prefix = folder
            .trim()
            .split(|c: char| c.is_whitespace() || c == '-')
            .next()?;
        Self::ALL.into_iter().find(|c| c.folder_prefix() == prefix)
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One adapter file known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Internal row id.
    pub id: i64,
    pub file_path: String,
    pub filename: String,
    pub base_model_code: Option<BaseModelCode>,
    pub category_code: Option<CategoryCode>,
    pub stable_id: Option<StableId>,
    /// Canonical layout. `None` only before the first classification pass.
    pub block_layout: Option<LayoutDescriptor>,
    pub has_block_weights: bool,
    pub lora_type: Option<String>,
    /// Whether the adapter carries text-encoder tensors. `None` when never inspected.
    pub clip_contributor: Option<bool>,
    pub missing: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Artifact {
    /// Layout to validate against; an unclassified artifact counts as unknown.
    pub fn layout(&self) -> LayoutDescriptor {
        self.block_layout.unwrap_or(LayoutDescriptor::Unknown)
    }

    pub fn layout_family(&self) -> Option<LayoutFamily> {
        self.base_model_code.and_then(|code| code.layout_family())
    }
}

/// Facts produced by external extraction for one adapter file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArtifact {
    pub file_path: String,
    /// Explicit codes override whatever the library path implies.
    #[serde(default)]
    pub base_model_code: Option<BaseModelCode>,
    #[serde(default)]
    pub category_code: Option<CategoryCode>,
    #[serde(default)]
    pub lora_type: Option<String>,
    /// Per-block weights in block order. Empty when extraction found no blocks.
    #[serde(default)]
    pub block_weights: Vec<f64>,
    /// Raw per-block strengths before normalization, parallel to `block_weights`.
    #[serde(default)]
    pub raw_strengths: Option<Vec<f64>>,
    /// Explicit text-encoder evidence. When absent, `tensor_keys` are inspected.
    #[serde(default)]
    pub clip_contributor: Option<bool>,
    /// Tensor key names, used to detect text-encoder contribution.
    #[serde(default)]
    pub tensor_keys: Option<Vec<String>>,
}

impl ExtractedArtifact {
    /// Clip evidence from the explicit flag or, failing that, the tensor keys.
    pub fn resolved_clip_contributor(&self) -> Option<bool> {
        self.clip_contributor.or_else(|| {
            self.tensor_keys
                .as_ref()
                .map(|keys| super::clip::detect_clip_contribution(keys).contributor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_model_from_folder() {
        assert_eq!(BaseModelCode::from_folder("FLUX"), Some(BaseModelCode::Flx));
        assert_eq!(BaseModelCode::from_folder("flux krea"), Some(BaseModelCode::Flk));
        assert_eq!(BaseModelCode::from_folder("WAN2.2"), Some(BaseModelCode::W22));
        assert_eq!(BaseModelCode::from_folder("Hunyuan"), None);
    }

    #[test]
    fn test_base_model_family() {
        assert_eq!(BaseModelCode::Flk.layout_family(), Some(LayoutFamily::Flux));
        assert_eq!(BaseModelCode::Pny.layout_family(), Some(LayoutFamily::Unet));
        assert_eq!(BaseModelCode::W21.layout_family(), None);
    }

    #[test]
    fn test_category_from_folder() {
        assert_eq!(CategoryCode::from_folder("01 - People"), Some(CategoryCode::Ppl));
        assert_eq!(
            CategoryCode::from_folder("07 - Machines_Vehicles"),
            Some(CategoryCode::Mcv)
        );
        assert_eq!(CategoryCode::from_folder("Misc"), None);
        assert_eq!(CategoryCode::from_code("nat"), Some(CategoryCode::Nat));
    }

    #[test]
    fn test_codes_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&BaseModelCode::Sd1).unwrap(), "\"SD1\"");
        assert_eq!(serde_json::to_string(&CategoryCode::Bdy).unwrap(), "\"BDY\"");
        let parsed: BaseModelCode = serde_json::from_str("\"W21\"").unwrap();
        assert_eq!(parsed, BaseModelCode::W21);
    }
}
