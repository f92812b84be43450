//! Centralized configuration for LoRA Atlas.
//!
//! Constants for storage paths, combination defaults, identity formatting and
//! catalog paging.

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "LoRA Atlas";
    pub const ADAPTER_EXTENSION: &'static str = "safetensors";
}

/// Directory and file names under the data root.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATA_DIR_NAME: &'static str = "atlas-data";
    pub const DATABASE_FILENAME: &'static str = "catalog.sqlite";
}

/// Defaults for the combination engine.
pub struct CombineConfig;

impl CombineConfig {
    /// Cap applied to the peak combined per-block influence when the caller omits one.
    pub const DEFAULT_CAP: f64 = 1.0;
    /// Model strength used for an artifact without an explicit override.
    pub const DEFAULT_STRENGTH: f64 = 1.0;
    /// Clip strength used for a known clip contributor without an explicit override.
    pub const DEFAULT_CLIP_STRENGTH: f64 = 1.0;
    /// Slack allowed when checking the taming bound.
    pub const FLOAT_TOLERANCE: f64 = 1e-9;
    /// Decimal places used for CSV renderings of combined weights.
    pub const CSV_DIGITS: usize = 4;
    /// Neutral weight used to fill fallback vectors.
    pub const NEUTRAL_WEIGHT: f64 = 1.0;
    /// Same-role energy overlap above which suggested strengths are damped.
    pub const OVERLAP_THRESHOLD: f64 = 0.85;
}

/// Stable identifier formatting.
pub struct IdentityConfig;

impl IdentityConfig {
    /// First sequence number handed out for a `(base, category)` pair.
    pub const FIRST_SEQUENCE: u32 = 1;
    /// Minimum zero-padded width of the sequence segment.
    pub const SEQUENCE_WIDTH: usize = 3;
}

/// Catalog search paging.
pub struct SearchConfig;

impl SearchConfig {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 5000;
}

/// Block export formatting.
pub struct ExportConfig;

impl ExportConfig {
    pub const CSV_HEADER: &'static str = "block_index,weight,raw_strength";
    pub const CSV_DIGITS: usize = 6;
}
