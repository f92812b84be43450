//! Block weights: vectors, validation, CSV export and user profiles.

mod profile;
mod validate;
mod vector;

pub use profile::{validate_profile_name, validate_profile_weights, BlockProfile, ProfileUpdate};
pub use validate::{blocks_to_csv, validate_blocks, BlocksView};
pub use vector::{BlockEntry, BlockWeightSource, BlockWeightVector};
