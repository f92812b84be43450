//! LoRA Atlas - headless catalog and combination engine for adapter artifacts.
//!
//! This crate classifies adapter block layouts, hands out stable identifiers,
//! stores per-block weights, and computes bounded multi-adapter configurations.
//! It can be used programmatically without any HTTP/RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use lora_atlas::{CombinationRequest, LoraAtlas};
//!
//! #[tokio::main]
//! async fn main() -> lora_atlas::Result<()> {
//!     let atlas = LoraAtlas::builder("/path/to/atlas")
//!         .auto_create_dirs(true)
//!         .build()
//!         .await?;
//!
//!     let request = CombinationRequest::new(["FLX-PPL-001", "FLX-PPL-002"]).with_cap(0.8);
//!     let result = atlas.combine_preview(&request).await?;
//!     println!("scale {}", result.scale);
//!
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod blocks;
pub mod combine;
pub mod config;
pub mod error;
pub mod identity;
pub mod layout;
pub mod store;

mod api;

// Re-export commonly used types
pub use api::{BackfillReport, LoraAtlasBuilder, RegistrationOutcome};
pub use artifact::{Artifact, BaseModelCode, CategoryCode, ExtractedArtifact};
pub use blocks::{BlockProfile, BlockWeightVector, BlocksView, ProfileUpdate};
pub use combine::{
    ClipStrength, CombinationRequest, CombinationResult, Exclusion, ExclusionReason, Role,
    RoleAllocation, StrengthOverride,
};
pub use error::{AtlasError, Result};
pub use identity::{AssignmentReport, StableId};
pub use layout::{Classification, LayoutDescriptor, LayoutRegistry, RawLayoutSignal};
pub use store::{
    ArtifactPage, ArtifactQuery, CatalogStore, ConfigurationRecord, ConfigurationSummary,
    IdAssignment, IndexSummary, SqliteCatalog,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main API struct for LoRA Atlas operations.
///
/// Cheap to clone; clones share the same catalog connection.
#[derive(Clone)]
pub struct LoraAtlas {
    /// Root directory holding `atlas-data/`
    data_root: PathBuf,
    /// Adapter library root used to infer codes from file paths
    library_root: Option<PathBuf>,
    store: Arc<SqliteCatalog>,
    registry: LayoutRegistry,
}

impl LoraAtlas {
    /// Create a builder for LoraAtlas.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let atlas = LoraAtlas::builder("./atlas")
    ///     .auto_create_dirs(true)
    ///     .library_root("/mnt/loras")
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder(data_root: impl Into<PathBuf>) -> LoraAtlasBuilder {
        LoraAtlasBuilder::new(data_root)
    }

    /// Open an atlas rooted at an existing directory with default options.
    pub async fn new(data_root: impl Into<PathBuf>) -> Result<Self> {
        LoraAtlasBuilder::new(data_root).build().await
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn library_root(&self) -> Option<&Path> {
        self.library_root.as_deref()
    }

    /// Direct access to the catalog store.
    pub fn store(&self) -> &SqliteCatalog {
        &self.store
    }
}
