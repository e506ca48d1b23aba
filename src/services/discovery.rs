//! Source file discovery.
//!
//! Walks the root with `ignore` (so `.gitignore` rules apply), keeps files
//! the language registry supports, and applies the include/exclude globs to
//! root-relative paths. Output order is stable: entries are sorted by file
//! name at every directory level.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::error::AppError;
use crate::languages::{self, LanguageSpec};

/// A supported source file found under the root.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub absolute: PathBuf,
    /// Root-relative, `/`-separated.
    pub path: String,
    pub spec: LanguageSpec,
}

/// Compiled include/exclude rules.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl FileFilter {
    /// An empty include list admits every file.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, AppError> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_glob_set(include)?)
        };
        Ok(Self {
            include,
            exclude: build_glob_set(exclude)?,
        })
    }

    pub fn admits(&self, relative: &str) -> bool {
        if self.exclude.is_match(relative) {
            return false;
        }
        self.include
            .as_ref()
            .map_or(true, |include| include.is_match(relative))
    }

    /// True when everything below the directory is excluded.
    fn prunes_dir(&self, relative: &str) -> bool {
        // Probe with a child path so `**/dir/**` patterns match the directory
        self.exclude.is_match(format!("{}/_", relative))
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, AppError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| AppError::Validation(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AppError::Validation(format!("invalid glob set: {}", e)))
}

/// Root-relative path with `/` separators.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lists supported files under `root` in deterministic order.
///
/// Unreadable directory entries are logged and skipped.
pub fn discover(root: &Path, filter: &FileFilter) -> Result<Vec<DiscoveredFile>, AppError> {
    if !root.is_dir() {
        return Err(AppError::Validation(format!(
            "root {} is not a directory",
            root.display()
        )));
    }

    let prune_filter = filter.clone();
    let prune_root = root.to_path_buf();
    let walker = WalkBuilder::new(root)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry.depth() > 0
                && prune_filter.prunes_dir(&relative_path(&prune_root, entry.path())))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let Some(spec) = languages::for_path(entry.path()) else {
            continue;
        };
        let path = relative_path(root, entry.path());
        if !filter.admits(&path) {
            continue;
        }

        files.push(DiscoveredFile {
            absolute: entry.into_path(),
            path,
            spec,
        });
    }

    tracing::debug!(count = files.len(), root = %root.display(), "Discovered source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCLUDES;
    use crate::languages::Language;
    use std::fs;

    fn default_filter() -> FileFilter {
        let exclude: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        FileFilter::new(&[], &exclude).unwrap()
    }

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_discovers_supported_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.py");
        write(dir.path(), "src/a.go");
        write(dir.path(), "README.md");
        write(dir.path(), "lib/z.ts");

        let files = discover(dir.path(), &default_filter()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/z.ts", "src/a.go", "src/b.py"]);
        assert_eq!(files[1].spec.language, Language::Go);
        assert!(files[0].absolute.starts_with(dir.path()));
    }

    #[test]
    fn test_excluded_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js");
        write(dir.path(), "target/debug/build.rs");
        write(dir.path(), "app/main.rs");

        let files = discover(dir.path(), &default_filter()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["app/main.rs"]);
    }

    #[test]
    fn test_include_patterns_restrict() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/keep.py");
        write(dir.path(), "scripts/drop.py");

        let filter = FileFilter::new(&["src/**".to_string()], &[]).unwrap();
        let files = discover(dir.path(), &filter).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/keep.py");
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover(&dir.path().join("nope"), &default_filter());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let result = FileFilter::new(&["src/[".to_string()], &[]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
