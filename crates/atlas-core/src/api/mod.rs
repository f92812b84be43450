//! API implementation submodules.
//!
//! Each submodule contains `impl LoraAtlas` blocks that extend the public API
//! with domain-specific methods. The struct definition remains in `lib.rs`.

mod builder;
mod catalog;
mod combine;
mod configs;

pub use builder::LoraAtlasBuilder;
pub use catalog::{BackfillReport, RegistrationOutcome};
