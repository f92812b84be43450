//! Saved configuration sets.
//!
//! The combination result is stored as JSON and handed back untouched on load.

use super::records::{ConfigurationRecord, ConfigurationSummary};
use super::sqlite::{now_rfc3339, SqliteCatalog};
use crate::combine::{id_set_key, CombinationResult};
use crate::error::{AtlasError, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

fn validate_set_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AtlasError::validation("name", "must be non-empty"));
    }
    Ok(trimmed.to_string())
}

impl SqliteCatalog {
    /// Persist a combination result under a user-supplied name.
    pub fn insert_configuration_set(&self, name: &str, result: &CombinationResult) -> Result<i64> {
        let name = validate_set_name(name)?;
        let result_json = serde_json::to_string(result)?;
        let key = id_set_key(&result.request_stable_ids);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO configuration_sets (name, created_at, id_set_key,
                                             validated_base_model, validated_layout, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                now_rfc3339(),
                key,
                result.validated_base_model,
                result.validated_layout,
                result_json
            ],
        )?;
        let set_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO configuration_set_members (set_id, position, stable_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (position, entry) in result.per_artifact.iter().enumerate() {
                stmt.execute(params![set_id, position, entry.stable_id])?;
            }
        }
        tx.commit()?;

        debug!("Saved configuration set {} '{}' ({})", set_id, name, key);
        Ok(set_id)
    }

    /// Load a saved set exactly as it was stored.
    pub fn get_configuration_set(&self, id: i64) -> Result<ConfigurationRecord> {
        let conn = self.lock()?;
        let row: Option<(i64, String, String, String)> = conn
            .query_row(
                "SELECT id, name, created_at, result_json FROM configuration_sets WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, name, created_at, result_json)) = row else {
            return Err(AtlasError::ConfigurationNotFound { id });
        };

        Ok(ConfigurationRecord {
            id,
            name,
            created_at,
            result: serde_json::from_str(&result_json)?,
        })
    }

    fn row_to_summary(row: &Row) -> rusqlite::Result<(ConfigurationSummary, String)> {
        Ok((
            ConfigurationSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                stable_ids: Vec::new(),
                validated_base_model: row.get(3)?,
                validated_layout: row.get(4)?,
            },
            row.get(5)?,
        ))
    }

    fn summaries(&self, where_clause: &str, param: Option<&str>) -> Result<Vec<ConfigurationSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, created_at, validated_base_model, validated_layout, result_json
             FROM configuration_sets {where_clause} ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = match param {
            Some(p) => stmt
                .query_map(params![p], Self::row_to_summary)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], Self::row_to_summary)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };

        let mut out = Vec::with_capacity(rows.len());
        for (mut summary, result_json) in rows {
            let result: CombinationResult = serde_json::from_str(&result_json)?;
            summary.stable_ids = result.request_stable_ids;
            out.push(summary);
        }
        Ok(out)
    }

    /// All saved sets, newest first.
    pub fn list_configuration_sets(&self) -> Result<Vec<ConfigurationSummary>> {
        self.summaries("", None)
    }

    /// Saved sets whose requested ids equal the given set, in any order.
    pub fn find_configuration_sets<S: AsRef<str>>(
        &self,
        stable_ids: &[S],
    ) -> Result<Vec<ConfigurationSummary>> {
        let normalized: Vec<String> = stable_ids
            .iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if normalized.is_empty() {
            return Err(AtlasError::InvalidParams {
                message: "stable_ids must contain at least one id".to_string(),
            });
        }
        let key = id_set_key(&normalized);
        self.summaries("WHERE id_set_key = ?1", Some(&key))
    }

    pub fn delete_configuration_set(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM configuration_sets WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(AtlasError::ConfigurationNotFound { id });
        }
        debug!("Deleted configuration set {}", id);
        Ok(())
    }
}
