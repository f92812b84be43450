//! Configuration set and block profile methods on LoraAtlas.

use crate::blocks::{BlockProfile, ProfileUpdate};
use crate::combine::{CombinationRequest, CombinationResult};
use crate::error::Result;
use crate::identity::StableId;
use crate::store::{CatalogStore, ConfigurationRecord, ConfigurationSummary};
use crate::LoraAtlas;

impl LoraAtlas {
    // ========================================
    // Configuration sets
    // ========================================

    /// Save a previously computed result exactly as given.
    pub async fn save_configuration(&self, name: &str, result: &CombinationResult) -> Result<ConfigurationRecord> {
        let id = self.store.save_configuration_set(name, result)?;
        self.store.load_configuration_set(id)
    }

    /// Compute a combination and save it in one step.
    pub async fn save_combination(&self, name: &str, request: &CombinationRequest) -> Result<ConfigurationRecord> {
        let result = self.combine_preview(request).await?;
        self.save_configuration(name, &result).await
    }

    /// Load a saved set. The combination engine is not run.
    pub async fn load_configuration(&self, id: i64) -> Result<ConfigurationRecord> {
        self.store.load_configuration_set(id)
    }

    pub async fn list_configurations(&self) -> Result<Vec<ConfigurationSummary>> {
        self.store.list_configuration_sets()
    }

    /// Saved sets requested with exactly these ids, in any order.
    pub async fn find_configurations(&self, stable_ids: &[String]) -> Result<Vec<ConfigurationSummary>> {
        self.store.find_configuration_sets(stable_ids)
    }

    pub async fn delete_configuration(&self, id: i64) -> Result<()> {
        self.store.delete_configuration_set(id)
    }

    // ========================================
    // Block profiles
    // ========================================

    pub async fn list_profiles(&self, stable_id: &str) -> Result<Vec<BlockProfile>> {
        self.store.list_profiles(&StableId::parse(stable_id)?)
    }

    pub async fn create_profile(
        &self,
        stable_id: &str,
        profile_name: &str,
        block_weights: &[f64],
    ) -> Result<BlockProfile> {
        self.store
            .create_profile(&StableId::parse(stable_id)?, profile_name, block_weights)
    }

    pub async fn update_profile(
        &self,
        stable_id: &str,
        profile_id: i64,
        update: &ProfileUpdate,
    ) -> Result<BlockProfile> {
        self.store
            .update_profile(&StableId::parse(stable_id)?, profile_id, update)
    }

    pub async fn delete_profile(&self, stable_id: &str, profile_id: i64) -> Result<()> {
        self.store
            .delete_profile(&StableId::parse(stable_id)?, profile_id)
    }
}
