//! Block profile persistence.

use super::sqlite::{now_rfc3339, SqliteCatalog};
use crate::blocks::{validate_profile_name, validate_profile_weights, BlockProfile, ProfileUpdate};
use crate::error::{AtlasError, Result};
use crate::identity::StableId;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

impl SqliteCatalog {
    fn row_to_profile(row: &Row) -> rusqlite::Result<(BlockProfile, String)> {
        Ok((
            BlockProfile {
                id: row.get(0)?,
                stable_id: row.get(1)?,
                profile_name: row.get(2)?,
                block_weights: Vec::new(),
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            },
            row.get(3)?,
        ))
    }

    fn hydrate(raw: (BlockProfile, String)) -> Result<BlockProfile> {
        let (mut profile, weights_json) = raw;
        profile.block_weights = serde_json::from_str(&weights_json)?;
        Ok(profile)
    }

    fn require_artifact(&self, stable_id: &StableId) -> Result<crate::artifact::Artifact> {
        self.get_artifact(stable_id)?
            .ok_or_else(|| AtlasError::ArtifactNotFound {
                stable_id: stable_id.to_string(),
            })
    }

    pub fn list_profiles(&self, stable_id: &StableId) -> Result<Vec<BlockProfile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, stable_id, profile_name, block_weights_json, created_at, updated_at
             FROM block_profiles WHERE stable_id = ?1 ORDER BY profile_name COLLATE NOCASE, id",
        )?;
        let rows = stmt
            .query_map(params![stable_id], Self::row_to_profile)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::hydrate).collect()
    }

    fn get_profile(&self, stable_id: &StableId, profile_id: i64) -> Result<BlockProfile> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, stable_id, profile_name, block_weights_json, created_at, updated_at
                 FROM block_profiles WHERE id = ?1 AND stable_id = ?2",
                params![profile_id, stable_id],
                Self::row_to_profile,
            )
            .optional()?;
        match raw {
            Some(raw) => Self::hydrate(raw),
            None => Err(AtlasError::ProfileNotFound {
                stable_id: stable_id.to_string(),
                profile_id,
            }),
        }
    }

    pub fn create_profile(
        &self,
        stable_id: &StableId,
        profile_name: &str,
        block_weights: &[f64],
    ) -> Result<BlockProfile> {
        let artifact = self.require_artifact(stable_id)?;
        let name = validate_profile_name(profile_name)?;
        validate_profile_weights(&artifact.layout(), block_weights)?;
        let weights_json = serde_json::to_string(block_weights)?;

        let profile_id = {
            let conn = self.lock()?;
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO block_profiles (artifact_id, stable_id, profile_name,
                                             block_weights_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![artifact.id, stable_id, name, weights_json, now],
            )?;
            conn.last_insert_rowid()
        };

        debug!("Created profile {} '{}' for {}", profile_id, name, stable_id);
        self.get_profile(stable_id, profile_id)
    }

    pub fn update_profile(
        &self,
        stable_id: &StableId,
        profile_id: i64,
        update: &ProfileUpdate,
    ) -> Result<BlockProfile> {
        let artifact = self.require_artifact(stable_id)?;
        let current = self.get_profile(stable_id, profile_id)?;

        let name = match &update.profile_name {
            Some(name) => validate_profile_name(name)?,
            None => current.profile_name,
        };
        let weights = match &update.block_weights {
            Some(weights) => {
                validate_profile_weights(&artifact.layout(), weights)?;
                weights.clone()
            }
            None => current.block_weights,
        };

        {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE block_profiles SET profile_name = ?1, block_weights_json = ?2,
                        updated_at = ?3
                 WHERE id = ?4 AND stable_id = ?5",
                params![
                    name,
                    serde_json::to_string(&weights)?,
                    now_rfc3339(),
                    profile_id,
                    stable_id
                ],
            )?;
        }

        debug!("Updated profile {} for {}", profile_id, stable_id);
        self.get_profile(stable_id, profile_id)
    }

    pub fn delete_profile(&self, stable_id: &StableId, profile_id: i64) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM block_profiles WHERE id = ?1 AND stable_id = ?2",
            params![profile_id, stable_id],
        )?;
        if rows == 0 {
            return Err(AtlasError::ProfileNotFound {
                stable_id: stable_id.to_string(),
                profile_id,
            });
        }
        debug!("Deleted profile {} for {}", profile_id, stable_id);
        Ok(())
    }
}
