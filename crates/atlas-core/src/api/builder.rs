//! Builder for configuring LoraAtlas initialization.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PathsConfig;
use crate::error::{AtlasError, Result};
use crate::layout::LayoutRegistry;
use crate::store::SqliteCatalog;
use crate::LoraAtlas;

/// Builder for configuring LoraAtlas initialization.
///
/// # Example
///
/// ```rust,ignore
/// use lora_atlas::LoraAtlas;
///
/// let atlas = LoraAtlas::builder("./atlas")
///     .auto_create_dirs(true)
///     .backfill_on_start(false)
///     .build()
///     .await?;
/// ```
pub struct LoraAtlasBuilder {
    data_root: PathBuf,
    library_root: Option<PathBuf>,
    auto_create_dirs: bool,
    backfill_on_start: bool,
}

impl LoraAtlasBuilder {
    /// Create a new builder with the data root directory.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            library_root: None,
            auto_create_dirs: false,
            backfill_on_start: true,
        }
    }

    /// Auto-create `<data_root>/atlas-data/` if it doesn't exist.
    ///
    /// Default: `false` (the data root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Adapter library root. Registration infers base and category codes
    /// from paths below it.
    pub fn library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.library_root = Some(root.into());
        self
    }

    /// Run the layout backfill pass once after opening the catalog.
    ///
    /// Failures are logged, never fatal.
    ///
    /// Default: `true`
    pub fn backfill_on_start(mut self, enable: bool) -> Self {
        self.backfill_on_start = enable;
        self
    }

    fn create_directory_structure(data_root: &PathBuf) -> Result<()> {
        let dir = data_root.join(PathsConfig::DATA_DIR_NAME);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| AtlasError::io_with_path(e, &dir))?;
        }
        Ok(())
    }

    /// Build the LoraAtlas instance.
    pub async fn build(self) -> Result<LoraAtlas> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.data_root)?;
        } else if !self.data_root.exists() {
            return Err(AtlasError::Io {
                message: format!("Data root does not exist: {}", self.data_root.display()),
                path: Some(self.data_root.clone()),
                source: None,
            });
        }

        let db_path = self
            .data_root
            .join(PathsConfig::DATA_DIR_NAME)
            .join(PathsConfig::DATABASE_FILENAME);
        let store = Arc::new(SqliteCatalog::open(db_path)?);

        let atlas = LoraAtlas {
            data_root: self.data_root,
            library_root: self.library_root,
            store,
            registry: LayoutRegistry::new(),
        };

        if self.backfill_on_start {
            match atlas.backfill_layouts().await {
                Ok(report) if report.updated > 0 => {
                    tracing::info!(
                        "Startup layout backfill: examined={}, updated={}, unknown={}",
                        report.examined,
                        report.updated,
                        report.warnings.len()
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Startup layout backfill failed (non-fatal): {}", e),
            }
        }

        Ok(atlas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_requires_root_unless_auto_create() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("missing");

        assert!(LoraAtlasBuilder::new(&root).build().await.is_err());

        let atlas = LoraAtlasBuilder::new(&root)
            .auto_create_dirs(true)
            .build()
            .await
            .unwrap();
        assert!(root.join(PathsConfig::DATA_DIR_NAME).is_dir());
        assert!(atlas.store().db_path().exists());
    }
}
