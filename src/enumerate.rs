//! Discovery of candidate images under a source tree.

use crate::category::DESTINATION_ROOTS;
use crate::config::{CompiledFilters, SorterSettings};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A file picked up for sorting.
///
/// Immutable once enumerated and consumed by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// Path relative to the source root. Mirrored under each destination root.
    pub relative: PathBuf,
}

impl CandidateFile {
    /// Builds a candidate from a file inside `source_root`.
    ///
    /// Returns `None` if `path` is not below `source_root`.
    pub fn new(source_root: &Path, path: PathBuf) -> Option<Self> {
        let relative = path.strip_prefix(source_root).ok()?.to_path_buf();
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(Self { path, relative })
    }

    /// The file name, lower-cased. Empty if the path has no name component.
    pub fn lowercase_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Result of walking a source tree.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Files that will be classified.
    pub candidates: Vec<CandidateFile>,
    /// Entries the walker could not read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Recursively collects image files below `source_root`.
///
/// Only regular files whose extension is in the configured image set and
/// that pass `filters` are returned. When `destination_root` lies inside the
/// source tree, its category roots are skipped so earlier output is not
/// sorted again. Order is not meaningful.
pub fn enumerate_images(
    source_root: &Path,
    destination_root: &Path,
    settings: &SorterSettings,
    filters: &CompiledFilters,
) -> Enumeration {
    // Compared canonically, so `photos` and `/home/me/photos` name the same roots.
    let skipped_roots: Vec<PathBuf> = DESTINATION_ROOTS
        .iter()
        .map(|root| canonical(&destination_root.join(root)))
        .collect();

    let mut enumeration = Enumeration::default();
    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped_root(entry, &skipped_roots));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_root.to_path_buf());
                enumeration.unreadable.push((path, err.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() || !settings.is_image_file(entry.path()) {
            continue;
        }

        if let Some(candidate) = CandidateFile::new(source_root, entry.into_path())
            && filters.should_include(&candidate.relative)
        {
            enumeration.candidates.push(candidate);
        }
    }

    enumeration
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_skipped_root(entry: &DirEntry, skipped_roots: &[PathBuf]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    DESTINATION_ROOTS.iter().any(|root| *root == name)
        && skipped_roots.contains(&canonical(entry.path()))
}
