//! SQLite-backed catalog store.
//!
//! One connection behind a mutex, WAL journaling. Identity reservations run in
//! immediate transactions so concurrent writers are serialized by SQLite.

use super::records::{
    ArtifactPage, ArtifactQuery, ArtifactUpsert, ConfigurationRecord, IdAssignment, IndexSummary,
    LayoutRow,
};
use super::traits::CatalogStore;
use crate::artifact::{Artifact, BaseModelCode, CategoryCode};
use crate::blocks::{BlockEntry, BlockWeightSource, BlockWeightVector};
use crate::combine::CombinationResult;
use crate::error::{AtlasError, Result};
use crate::identity::{next_stable_id, StableId};
use crate::layout::Classification;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const ARTIFACT_COLUMNS: &str = "id, file_path, filename, base_model_code, category_code, \
     stable_id, block_layout, has_block_weights, lora_type, clip_contributor, missing, \
     created_at, updated_at";

pub(super) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// SQLite catalog of artifacts, block weights, configuration sets and profiles.
pub struct SqliteCatalog {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open or create a catalog database at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AtlasError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::init_schema(&conn)?;

        info!("Opened catalog at {}", db_path.display());

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        Ok(())
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                base_model_code TEXT,
                category_code TEXT,
                stable_id TEXT UNIQUE,
                block_layout TEXT,
                has_block_weights INTEGER NOT NULL DEFAULT 0,
                lora_type TEXT,
                clip_contributor INTEGER,
                missing INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_codes
                ON artifacts(base_model_code, category_code);
            CREATE INDEX IF NOT EXISTS idx_artifacts_filename ON artifacts(filename);

            CREATE TABLE IF NOT EXISTS block_weights (
                artifact_id INTEGER NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
                block_index INTEGER NOT NULL,
                weight REAL NOT NULL,
                raw_strength REAL,
                PRIMARY KEY (artifact_id, block_index)
            );

            CREATE TABLE IF NOT EXISTS stable_id_reservations (
                prefix TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                stable_id TEXT NOT NULL UNIQUE,
                reserved_at TEXT NOT NULL,
                PRIMARY KEY (prefix, sequence)
            );

            CREATE TABLE IF NOT EXISTS configuration_sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                id_set_key TEXT NOT NULL,
                validated_base_model TEXT NOT NULL,
                validated_layout TEXT NOT NULL,
                result_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_configuration_sets_key
                ON configuration_sets(id_set_key);

            CREATE TABLE IF NOT EXISTS configuration_set_members (
                set_id INTEGER NOT NULL REFERENCES configuration_sets(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                stable_id TEXT NOT NULL,
                PRIMARY KEY (set_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_configuration_set_members_id
                ON configuration_set_members(stable_id);

            CREATE TABLE IF NOT EXISTS block_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artifact_id INTEGER NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
                stable_id TEXT NOT NULL,
                profile_name TEXT NOT NULL,
                block_weights_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_block_profiles_stable_id
                ON block_profiles(stable_id);
            ",
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AtlasError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    pub(super) fn row_to_artifact(row: &Row) -> rusqlite::Result<Artifact> {
        Ok(Artifact {
            id: row.get(0)?,
            file_path: row.get(1)?,
            filename: row.get(2)?,
            base_model_code: row.get(3)?,
            category_code: row.get(4)?,
            stable_id: row.get(5)?,
            block_layout: row
                .get::<_, Option<String>>(6)?
                .and_then(|raw| crate::layout::LayoutDescriptor::normalize(Some(&raw))),
            has_block_weights: row.get(7)?,
            lora_type: row.get(8)?,
            clip_contributor: row.get(9)?,
            missing: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    // ========================================
    // Artifacts
    // ========================================

    /// Insert or update an artifact by file path and replace its block rows.
    ///
    /// The stable id of an existing row is never touched. A re-registered
    /// file is no longer missing.
    pub fn upsert_artifact(&self, upsert: &ArtifactUpsert, blocks: &[BlockEntry]) -> Result<Artifact> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_rfc3339();

        tx.execute(
            "INSERT INTO artifacts (file_path, filename, base_model_code, category_code,
                                    block_layout, has_block_weights, lora_type,
                                    clip_contributor, missing, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)
             ON CONFLICT(file_path) DO UPDATE SET
                 filename=excluded.filename,
                 base_model_code=excluded.base_model_code,
                 category_code=excluded.category_code,
                 block_layout=excluded.block_layout,
                 has_block_weights=excluded.has_block_weights,
                 lora_type=excluded.lora_type,
                 clip_contributor=COALESCE(excluded.clip_contributor, artifacts.clip_contributor),
                 missing=0,
                 updated_at=excluded.updated_at",
            params![
                upsert.file_path,
                upsert.filename,
                upsert.base_model_code,
                upsert.category_code,
                upsert.block_layout,
                upsert.has_block_weights,
                upsert.lora_type,
                upsert.clip_contributor,
                now,
            ],
        )?;

        let artifact_id: i64 = tx.query_row(
            "SELECT id FROM artifacts WHERE file_path = ?1",
            params![upsert.file_path],
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM block_weights WHERE artifact_id = ?1",
            params![artifact_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO block_weights (artifact_id, block_index, weight, raw_strength)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for block in blocks {
                stmt.execute(params![
                    artifact_id,
                    block.block_index,
                    block.weight,
                    block.raw_strength
                ])?;
            }
        }

        let artifact = tx.query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"),
            params![artifact_id],
            Self::row_to_artifact,
        )?;
        tx.commit()?;

        debug!(
            "Registered {} ({} blocks, layout {})",
            upsert.file_path,
            blocks.len(),
            upsert.block_layout
        );
        Ok(artifact)
    }

    /// Flag an artifact whose file disappeared. Returns false when the path is unknown.
    pub fn mark_missing(&self, file_path: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE artifacts SET missing = 1, updated_at = ?1 WHERE file_path = ?2",
            params![now_rfc3339(), file_path],
        )?;
        if rows > 0 {
            debug!("Marked missing: {}", file_path);
        }
        Ok(rows > 0)
    }

    pub fn get_artifact(&self, stable_id: &StableId) -> Result<Option<Artifact>> {
        let conn = self.lock()?;
        Self::artifact_in(&conn, stable_id)
    }

    fn artifact_in(conn: &Connection, stable_id: &StableId) -> Result<Option<Artifact>> {
        let artifact = conn
            .query_row(
                &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE stable_id = ?1"),
                params![stable_id],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(artifact)
    }

    /// Read an artifact and its weight vector under one lock.
    ///
    /// The vector is `None` when the artifact has no stored weights and its
    /// layout has no fallback.
    pub fn artifact_snapshot(
        &self,
        stable_id: &StableId,
    ) -> Result<Option<(Artifact, Option<BlockWeightVector>)>> {
        let conn = self.lock()?;
        let Some(artifact) = Self::artifact_in(&conn, stable_id)? else {
            return Ok(None);
        };

        let entries = Self::entries_in(&conn, artifact.id)?;
        let weights = if entries.is_empty() {
            BlockWeightVector::fallback_for(&artifact.layout())
        } else {
            Some(BlockWeightVector::from_entries(&entries))
        };
        Ok(Some((artifact, weights)))
    }

    pub fn get_artifact_by_path(&self, file_path: &str) -> Result<Option<Artifact>> {
        let conn = self.lock()?;
        let artifact = conn
            .query_row(
                &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE file_path = ?1"),
                params![file_path],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(artifact)
    }

    /// Filtered, paged search ordered by filename.
    pub fn search(&self, query: &ArtifactQuery) -> Result<ArtifactPage> {
        let conn = self.lock()?;

        let mut where_clause = String::from("WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !query.include_missing {
            where_clause.push_str(" AND missing = 0");
        }
        if let Some(base) = query.base_model_code {
            where_clause.push_str(" AND base_model_code = ?");
            params_vec.push(Box::new(base));
        }
        if let Some(category) = query.category_code {
            where_clause.push_str(" AND category_code = ?");
            params_vec.push(Box::new(category));
        }
        if let Some(has_blocks) = query.has_blocks {
            where_clause.push_str(" AND has_block_weights = ?");
            params_vec.push(Box::new(has_blocks));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            where_clause.push_str(" AND LOWER(filename) LIKE ?");
            params_vec.push(Box::new(format!("%{}%", search.to_lowercase())));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let total: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM artifacts {where_clause}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts {where_clause} \
             ORDER BY filename COLLATE NOCASE, id LIMIT {limit} OFFSET {offset}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), Self::row_to_artifact)?;

        let mut results = Vec::new();
        for row in rows {
            match row {
                Ok(artifact) => results.push(artifact),
                Err(e) => warn!("Error reading artifact row: {}", e),
            }
        }

        Ok(ArtifactPage {
            results,
            total,
            limit,
            offset,
        })
    }

    /// Every artifact with its raw stored layout text and block row count.
    pub fn list_layout_rows(&self) -> Result<Vec<LayoutRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARTIFACT_COLUMNS},
                    (SELECT COUNT(*) FROM block_weights b WHERE b.artifact_id = artifacts.id)
             FROM artifacts ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(LayoutRow {
                artifact: Self::row_to_artifact(row)?,
                stored_layout: row.get(6)?,
                block_count: row.get(13)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Write a fresh classification for one artifact.
    pub fn update_classification(&self, artifact_id: i64, classification: &Classification) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE artifacts SET block_layout = ?1, has_block_weights = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                classification.descriptor,
                classification.has_block_weights,
                now_rfc3339(),
                artifact_id
            ],
        )?;
        Ok(())
    }

    pub fn block_entries(&self, artifact_id: i64) -> Result<Vec<BlockEntry>> {
        let conn = self.lock()?;
        Self::entries_in(&conn, artifact_id)
    }

    fn entries_in(conn: &Connection, artifact_id: i64) -> Result<Vec<BlockEntry>> {
        let mut stmt = conn.prepare(
            "SELECT block_index, weight, raw_strength FROM block_weights
             WHERE artifact_id = ?1 ORDER BY block_index ASC",
        )?;
        let rows = stmt.query_map(params![artifact_id], |row| {
            Ok(BlockEntry {
                block_index: row.get(0)?,
                weight: row.get(1)?,
                raw_strength: row.get(2)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn index_summary(&self) -> Result<IndexSummary> {
        let conn = self.lock()?;
        let (total, with_blocks, with_stable_id, missing): (usize, usize, usize, usize) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(has_block_weights), 0),
                        COALESCE(SUM(CASE WHEN stable_id IS NOT NULL THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(missing), 0)
                 FROM artifacts",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(IndexSummary {
            total,
            with_blocks,
            no_blocks: total - with_blocks,
            with_stable_id,
            missing,
        })
    }

    // ========================================
    // Identity
    // ========================================

    /// Ids issued to artifacts plus every id ever reserved.
    fn issued_ids(conn: &Connection) -> Result<HashSet<StableId>> {
        let mut stmt = conn.prepare(
            "SELECT stable_id FROM artifacts WHERE stable_id IS NOT NULL
             UNION SELECT stable_id FROM stable_id_reservations",
        )?;
        Self::collect_ids(&mut stmt)
    }

    /// Ids named by saved configuration sets or block profiles.
    fn referenced_ids(conn: &Connection) -> Result<HashSet<StableId>> {
        let mut stmt = conn.prepare(
            "SELECT stable_id FROM configuration_set_members
             UNION SELECT stable_id FROM block_profiles",
        )?;
        Self::collect_ids(&mut stmt)
    }

    fn collect_ids(stmt: &mut rusqlite::Statement<'_>) -> Result<HashSet<StableId>> {
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            let raw = row?;
            match StableId::parse(&raw) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => warn!("Ignoring malformed stored stable id '{}'", raw),
            }
        }
        Ok(ids)
    }

    fn reserve_in(conn: &Connection, base: BaseModelCode, category: CategoryCode) -> Result<StableId> {
        let existing = Self::issued_ids(conn)?;
        let referenced = Self::referenced_ids(conn)?;
        let stable_id = next_stable_id(base, category, &existing, &referenced)?;

        conn.execute(
            "INSERT INTO stable_id_reservations (prefix, sequence, stable_id, reserved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                stable_id.prefix(),
                stable_id.sequence(),
                stable_id,
                now_rfc3339()
            ],
        )?;
        Ok(stable_id)
    }

    /// Give the artifact a stable id matching its stored codes.
    ///
    /// The row is re-read inside the transaction. An id that already matches
    /// the row's codes is kept, so a racing registration or repair pass never
    /// replaces an id another caller was handed. `expected` is the id the
    /// caller last saw.
    pub fn assign_stable_id(
        &self,
        artifact_id: i64,
        expected: Option<&StableId>,
    ) -> Result<IdAssignment> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row: Option<(Option<StableId>, Option<BaseModelCode>, Option<CategoryCode>)> = tx
            .query_row(
                "SELECT stable_id, base_model_code, category_code FROM artifacts WHERE id = ?1",
                [artifact_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((current, base, category)) = row else {
            return Err(AtlasError::Other(format!(
                "Artifact row {artifact_id} disappeared during id assignment"
            )));
        };
        let (Some(base), Some(category)) = (base, category) else {
            return Err(AtlasError::validation(
                "stable_id",
                format!("artifact row {artifact_id} has no base model or category code"),
            ));
        };

        if current.as_ref() != expected {
            debug!(
                "Artifact {} id changed from {:?} to {:?} before assignment",
                artifact_id, expected, current
            );
        }
        if let Some(current) = current.as_ref().filter(|id| id.matches(base, category)) {
            return Ok(IdAssignment::Kept(current.clone()));
        }

        let stable_id = Self::reserve_in(&tx, base, category)?;
        let rows = tx.execute(
            "UPDATE artifacts SET stable_id = ?1, updated_at = ?2
             WHERE id = ?3 AND stable_id IS ?4",
            params![stable_id, now_rfc3339(), artifact_id, current],
        )?;
        if rows == 0 {
            return Err(AtlasError::Other(format!(
                "Artifact row {artifact_id} changed during id assignment"
            )));
        }
        tx.commit()?;

        debug!("Assigned {} to artifact {}", stable_id, artifact_id);
        Ok(IdAssignment::Issued(stable_id))
    }

    /// All ids named by configuration sets or profiles.
    pub fn list_referenced_ids(&self) -> Result<HashSet<StableId>> {
        let conn = self.lock()?;
        Self::referenced_ids(&conn)
    }

    /// Count artifacts per stable id; any count above one is a uniqueness breach.
    pub fn stable_id_counts(&self) -> Result<HashMap<String, usize>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT stable_id, COUNT(*) FROM artifacts
             WHERE stable_id IS NOT NULL GROUP BY stable_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut counts = HashMap::new();
        for row in rows {
            let (id, count): (String, usize) = row?;
            counts.insert(id, count);
        }
        Ok(counts)
    }
}

impl BlockWeightSource for SqliteCatalog {
    fn get_block_weight_vector(&self, stable_id: &StableId) -> Result<Option<BlockWeightVector>> {
        Ok(self
            .artifact_snapshot(stable_id)?
            .and_then(|(_, weights)| weights))
    }
}

impl CatalogStore for SqliteCatalog {
    fn reserve_next_sequence(&self, base: BaseModelCode, category: CategoryCode) -> Result<u32> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stable_id = Self::reserve_in(&tx, base, category)?;
        tx.commit()?;
        Ok(stable_id.sequence())
    }

    fn list_stable_ids(&self) -> Result<HashSet<StableId>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT stable_id FROM artifacts WHERE stable_id IS NOT NULL")?;
        Self::collect_ids(&mut stmt)
    }

    fn save_configuration_set(&self, name: &str, result: &CombinationResult) -> Result<i64> {
        self.insert_configuration_set(name, result)
    }

    fn load_configuration_set(&self, id: i64) -> Result<ConfigurationRecord> {
        self.get_configuration_set(id)
    }
}
