//! Human-readable stable identifiers of the form `BASE-CAT-NNN`.

use crate::artifact::{BaseModelCode, CategoryCode};
use crate::config::IdentityConfig;
use crate::error::{AtlasError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static STABLE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]{3})-([A-Z0-9]{3})-([0-9]{3,})$").unwrap());

/// Validated stable identifier, e.g. `FLX-PPL-001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StableId {
    text: String,
    sequence: u32,
}

impl StableId {
    pub fn new(base: BaseModelCode, category: CategoryCode, sequence: u32) -> Self {
        Self {
            text: format!(
                "{}-{:0width$}",
                Self::prefix_for(base, category),
                sequence,
                width = IdentityConfig::SEQUENCE_WIDTH
            ),
            sequence,
        }
    }

    /// Parse and normalize (trim, uppercase) an identifier string.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_uppercase();
        let invalid = || AtlasError::InvalidStableId {
            value: raw.to_string(),
        };

        let caps = STABLE_ID_PATTERN.captures(&normalized).ok_or_else(invalid)?;
        let sequence = caps[3].parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            text: normalized,
            sequence,
        })
    }

    /// `BASE-CAT` prefix shared by every id in one sequence.
    pub fn prefix_for(base: BaseModelCode, category: CategoryCode) -> String {
        format!("{}-{}", base.as_str(), category.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `BASE-CAT` part of this id.
    pub fn prefix(&self) -> &str {
        &self.text[..7]
    }

    pub fn base_code(&self) -> &str {
        &self.text[..3]
    }

    pub fn category_code(&self) -> &str {
        &self.text[4..7]
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Whether this id belongs to the `(base, category)` sequence.
    pub fn matches(&self, base: BaseModelCode, category: CategoryCode) -> bool {
        self.base_code() == base.as_str() && self.category_code() == category.as_str()
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for StableId {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StableId {
    type Error = AtlasError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StableId> for String {
    fn from(id: StableId) -> Self {
        id.text
    }
}

impl AsRef<str> for StableId {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_zero_padded() {
        let id = StableId::new(BaseModelCode::Flx, CategoryCode::Ppl, 7);
        assert_eq!(id.as_str(), "FLX-PPL-007");
        assert_eq!(id.prefix(), "FLX-PPL");
        assert_eq!(id.sequence(), 7);

        let wide = StableId::new(BaseModelCode::Sdx, CategoryCode::Stl, 1234);
        assert_eq!(wide.as_str(), "SDX-STL-1234");
    }

    #[test]
    fn test_parse_normalizes() {
        let id = StableId::parse("  flx-ppl-012 ").unwrap();
        assert_eq!(id.as_str(), "FLX-PPL-012");
        assert_eq!(id.sequence(), 12);
        assert!(id.matches(BaseModelCode::Flx, CategoryCode::Ppl));
        assert!(!id.matches(BaseModelCode::Flk, CategoryCode::Ppl));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "FLX-PPL-1", "FLXPPL001", "FLX-PP-001", "FLX_PPL_001"] {
            assert!(
                matches!(StableId::parse(bad), Err(AtlasError::InvalidStableId { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_as_string() {
        let id = StableId::new(BaseModelCode::W21, CategoryCode::Act, 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"W21-ACT-003\"");
        let back: StableId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<StableId>("\"nope\"").is_err());
    }
}
