//! Persistence boundary used by identity assignment and configuration sets.

use super::records::ConfigurationRecord;
use crate::artifact::{BaseModelCode, CategoryCode};
use crate::blocks::BlockWeightSource;
use crate::combine::CombinationResult;
use crate::error::Result;
use crate::identity::StableId;
use std::collections::HashSet;

/// Operations the core needs from whatever stores the catalog.
///
/// Implementations must make `reserve_next_sequence` atomic: two concurrent
/// callers for the same `(base, category)` never receive the same sequence.
pub trait CatalogStore: BlockWeightSource + Send + Sync {
    /// Reserve and return the next free sequence for `(base, category)`.
    fn reserve_next_sequence(&self, base: BaseModelCode, category: CategoryCode) -> Result<u32>;

    /// Every stable id currently issued to an artifact.
    fn list_stable_ids(&self) -> Result<HashSet<StableId>>;

    /// Persist a combination result verbatim and return its id.
    fn save_configuration_set(&self, name: &str, result: &CombinationResult) -> Result<i64>;

    /// Load a saved combination without recomputing it.
    fn load_configuration_set(&self, id: i64) -> Result<ConfigurationRecord>;
}
