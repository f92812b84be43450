//! Library path conventions.
//!
//! Adapters live at `<root>/<BASE>/<NN - Category>/.../<file>.safetensors`.
//! Video bases add a generation-mode folder: `<root>/WAN2.2/T2V/<NN - Category>/...`.

use super::types::{BaseModelCode, CategoryCode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Generation-mode folders that may sit between a video base and its category.
const MODE_FOLDERS: &[&str] = &["T2V", "I2V", "V2V", "T2I", "I2I", "IMG2VID", "IMAGE2VIDEO"];

/// Codes implied by an adapter's location in the library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryPlacement {
    pub base_model_code: Option<BaseModelCode>,
    pub category_code: Option<CategoryCode>,
    /// Base folder as it appears on disk.
    pub base_folder: Option<String>,
    /// Category folder as it appears on disk.
    pub category_folder: Option<String>,
    /// Generation-mode folder for video bases.
    pub mode_folder: Option<String>,
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// Resolve base and category codes from a file path relative to the library root.
///
/// Paths outside the root, or too shallow to carry a category folder, yield an
/// empty placement.
pub fn parse_library_path(root: &Path, file_path: &Path) -> LibraryPlacement {
    let root = root.to_string_lossy();
    let file = file_path.to_string_lossy();
    let root_segments = split_segments(&root);
    let file_segments = split_segments(&file);

    if file_segments.len() <= root_segments.len()
        || !root_segments
            .iter()
            .zip(&file_segments)
            .all(|(a, b)| a == b)
    {
        return LibraryPlacement::default();
    }

    let parts = &file_segments[root_segments.len()..];
    // base folder, category folder, file
    if parts.len() < 3 {
        return LibraryPlacement::default();
    }

    let base_folder = parts[0];
    let base_model_code = BaseModelCode::from_folder(base_folder);

    let mut category_index = 1;
    let mut mode_folder = None;
    if base_model_code.is_some_and(|code| code.has_mode_folders()) && parts.len() >= 4 {
        let candidate = parts[1].trim().to_uppercase();
        if MODE_FOLDERS.contains(&candidate.as_str()) {
            mode_folder = Some(parts[1].to_string());
            category_index = 2;
        }
    }

    let category_folder = parts[category_index];

    LibraryPlacement {
        base_model_code,
        category_code: CategoryCode::from_folder(category_folder),
        base_folder: Some(base_folder.to_string()),
        category_folder: Some(category_folder.to_string()),
        mode_folder,
    }
}

/// Final path segment, accepting either separator.
pub fn file_name(file_path: &str) -> String {
    split_segments(file_path)
        .last()
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Whether the path names an adapter file.
pub fn is_adapter_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(crate::config::AppConfig::ADAPTER_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let placement = parse_library_path(
            Path::new("/models/loras"),
            Path::new("/models/loras/FLUX/01 - People/portraits/anna.safetensors"),
        );
        assert_eq!(placement.base_model_code, Some(BaseModelCode::Flx));
        assert_eq!(placement.category_code, Some(CategoryCode::Ppl));
        assert_eq!(placement.mode_folder, None);
    }

    #[test]
    fn test_video_mode_folder_shifts_category() {
        let placement = parse_library_path(
            Path::new("/models/loras"),
            Path::new("/models/loras/WAN2.2/T2V/04 - Action/run.safetensors"),
        );
        assert_eq!(placement.base_model_code, Some(BaseModelCode::W22));
        assert_eq!(placement.category_code, Some(CategoryCode::Act));
        assert_eq!(placement.mode_folder.as_deref(), Some("T2V"));
    }

    #[test]
    fn test_mode_folder_ignored_for_image_bases() {
        let placement = parse_library_path(
            Path::new("/models/loras"),
            Path::new("/models/loras/SDXL/T2V/04 - Action/run.safetensors"),
        );
        assert_eq!(placement.base_model_code, Some(BaseModelCode::Sdx));
        assert_eq!(placement.category_code, None);
        assert_eq!(placement.category_folder.as_deref(), Some("T2V"));
    }

    #[test]
    fn test_backslash_paths() {
        let placement = parse_library_path(
            Path::new(r"E:\models\loras"),
            Path::new(r"E:\models\loras\Flux Krea\02 - Styles\ink.safetensors"),
        );
        assert_eq!(placement.base_model_code, Some(BaseModelCode::Flk));
        assert_eq!(placement.category_code, Some(CategoryCode::Stl));
    }

    #[test]
    fn test_outside_root_or_too_shallow() {
        let outside = parse_library_path(
            Path::new("/models/loras"),
            Path::new("/other/FLUX/01 - People/a.safetensors"),
        );
        assert_eq!(outside, LibraryPlacement::default());

        let shallow = parse_library_path(
            Path::new("/models/loras"),
            Path::new("/models/loras/FLUX/a.safetensors"),
        );
        assert_eq!(shallow, LibraryPlacement::default());
    }

    #[test]
    fn test_file_name_and_extension() {
        assert_eq!(file_name(r"C:\a\b\style.safetensors"), "style.safetensors");
        assert!(is_adapter_file(Path::new("x/y.SafeTensors")));
        assert!(!is_adapter_file(Path::new("x/y.ckpt")));
    }
}
