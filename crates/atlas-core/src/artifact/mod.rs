//! Adapter artifacts: code tables, library path parsing and clip evidence.

mod clip;
mod paths;
mod types;

pub use clip::{detect_clip_contribution, ClipEvidence};
pub use paths::{file_name, is_adapter_file, parse_library_path, LibraryPlacement};
pub use types::{Artifact, BaseModelCode, CategoryCode, ExtractedArtifact};
