//! Catalog persistence.
//!
//! `CatalogStore` is the boundary the identity and combination code relies
//! on; `SqliteCatalog` is the only implementation.

mod configs;
mod profiles;
mod records;
mod sql_types;
mod sqlite;
mod traits;

pub use records::{
    ArtifactPage, ArtifactQuery, ArtifactUpsert, ConfigurationRecord, ConfigurationSummary,
    IdAssignment, IndexSummary, LayoutRow,
};
pub use sqlite::SqliteCatalog;
pub use traits::CatalogStore;
