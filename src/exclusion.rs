//! @dose
//! purpose: Header discovery for the declaration scan. Expands the configured type header
//!     paths (files or directories) into the list of headers to read, minus the files matched
//!     by the exclude patterns of apidoctool.toml.
//!
//! when-editing:
//!     - !Override patterns use ! prefix to negate (exclude), so we add ! to user patterns
//!     - A directory contributes only the `.h` files directly inside it
//!
//! invariants:
//!     - The result is sorted by file name, then by full path; the order in which headers
//!       reach the symbol table decides which of two conflicting declarations wins
//!     - A configured path that doesn't exist is an error, never skipped
//!
//! gotchas:
//!     - The ignore crate's override patterns are inclusive by default, so we negate them
//!     - Explicitly listed files are filtered by the globset, directory entries by the walker

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_EXTENSION: &str = "h";

/// Configuration for file exclusion during header discovery
#[derive(Debug, Default)]
pub struct ExclusionConfig {
    /// Glob patterns to exclude, relative to the root
    pub patterns: Vec<String>,
}

impl ExclusionConfig {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }
}

/// Build a WalkBuilder listing the top level of `dir` with the exclusion patterns applied
pub fn build_walker(root: &Path, dir: &Path, config: &ExclusionConfig) -> WalkBuilder {
    let mut builder = WalkBuilder::new(dir);
    builder.max_depth(Some(1));
    builder.standard_filters(false);

    let mut overrides = OverrideBuilder::new(root);
    for pattern in &config.patterns {
        let exclude_pattern = format!("!{}", pattern);
        if let Err(e) = overrides.add(&exclude_pattern) {
            warn!("Invalid exclude pattern '{}': {}", pattern, e);
        }
    }
    if let Ok(built) = overrides.build() {
        builder.overrides(built);
    }

    builder
}

/// Build a GlobSet from patterns for filtering explicitly listed files
pub fn build_exclude_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => {
                warn!("Invalid exclude pattern '{}': {}", pattern, e);
            }
        }
    }

    builder.build().ok()
}

fn is_header(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == HEADER_EXTENSION)
}

/// Headers named by `paths` (relative to `root` unless absolute).
pub fn collect_headers(
    root: &Path,
    paths: &[String],
    config: &ExclusionConfig,
) -> Result<Vec<PathBuf>> {
    let globset = build_exclude_globset(&config.patterns);
    let excluded = |path: &Path| {
        let relative = path.strip_prefix(root).unwrap_or(path);
        globset.as_ref().is_some_and(|g| g.is_match(relative))
    };

    let mut headers = Vec::new();
    for entry in paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let path = crate::config::Config::resolve(root, entry);
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }

        if path.is_dir() {
            for item in build_walker(root, &path, config).build() {
                let item = item?;
                if is_header(item.path()) {
                    headers.push(item.into_path());
                }
            }
        } else if excluded(&path) {
            debug!("Excluded header: {}", path.display());
        } else {
            headers.push(path);
        }
    }

    headers.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    headers.dedup();
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn names(headers: &[PathBuf]) -> Vec<String> {
        headers
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let types = temp_dir.path().join("types");
        fs::create_dir_all(types.join("nested")).unwrap();
        fs::write(types.join("user_data.h"), "struct UserData {};").unwrap();
        fs::write(types.join("camera_data.h"), "struct CameraData {};").unwrap();
        fs::write(types.join("private_data.h"), "struct PrivateData {};").unwrap();
        fs::write(types.join("camera_data.cpp"), "").unwrap();
        fs::write(types.join("nested/deep.h"), "").unwrap();
        fs::write(temp_dir.path().join("api.h"), "").unwrap();
        temp_dir
    }

    // ===== Discovery Tests =====

    #[test]
    fn test_directory_contributes_top_level_headers() {
        let temp_dir = project();
        let headers = collect_headers(
            temp_dir.path(),
            &["types".to_string()],
            &ExclusionConfig::default(),
        )
        .unwrap();
        assert_eq!(
            names(&headers),
            vec!["camera_data.h", "private_data.h", "user_data.h"]
        );
    }

    #[test]
    fn test_files_and_directories_sorted_by_file_name() {
        let temp_dir = project();
        let headers = collect_headers(
            temp_dir.path(),
            &["types".to_string(), "api.h".to_string()],
            &ExclusionConfig::default(),
        )
        .unwrap();
        assert_eq!(
            names(&headers),
            vec!["api.h", "camera_data.h", "private_data.h", "user_data.h"]
        );
    }

    #[test]
    fn test_exclude_patterns() {
        let temp_dir = project();
        let config = ExclusionConfig::new(&["**/private_*.h".to_string(), "api.h".to_string()]);
        let headers = collect_headers(
            temp_dir.path(),
            &["types".to_string(), "api.h".to_string()],
            &config,
        )
        .unwrap();
        assert_eq!(names(&headers), vec!["camera_data.h", "user_data.h"]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let temp_dir = project();
        let err = collect_headers(
            temp_dir.path(),
            &["missing".to_string()],
            &ExclusionConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("File not found: "));
    }

    #[test]
    fn test_build_exclude_globset() {
        assert!(build_exclude_globset(&[]).is_none());
        let globset = build_exclude_globset(&["**/private_*.h".to_string()]).unwrap();
        assert!(globset.is_match("types/private_data.h"));
        assert!(!globset.is_match("types/user_data.h"));
    }
}
