//! File discovery.
//!
//! Walks the project root honoring gitignore rules and the configured
//! include/exclude globs, returning the candidate file list the pipeline
//! fans out to analysis plugins.

use crate::core::{Error, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Include/exclude globs applied during the walk.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPatterns {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl DiscoveryPatterns {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }
}

/// Discovery contract consumed by the pipeline. Must fail with a distinct
/// root-path-missing error when the root does not exist.
pub trait FileDiscovery: Send + Sync {
    fn discover_files(
        &self,
        root: &Path,
        patterns: Option<&DiscoveryPatterns>,
    ) -> Result<Vec<PathBuf>>;
}

/// Default discovery built on the `ignore` walker.
#[derive(Debug)]
pub struct WalkerDiscovery {
    /// Honor .gitignore files during the walk (default: true).
    pub respect_gitignore: bool,
}

impl Default for WalkerDiscovery {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
        }
    }
}

impl WalkerDiscovery {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileDiscovery for WalkerDiscovery {
    fn discover_files(
        &self,
        root: &Path,
        patterns: Option<&DiscoveryPatterns>,
    ) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Err(Error::RootPathMissing(root.to_path_buf()));
        }

        let compiled = patterns.map(compile_patterns).transpose()?;

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| Error::file_system(e.to_string(), root))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if matches_patterns(relative, compiled.as_ref()) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        log::debug!("discovered {} files under {}", files.len(), root.display());
        Ok(files)
    }
}

struct CompiledPatterns {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

fn compile_patterns(patterns: &DiscoveryPatterns) -> Result<CompiledPatterns> {
    let compile = |globs: &[String]| -> Result<Vec<glob::Pattern>> {
        globs
            .iter()
            .map(|g| glob::Pattern::new(g).map_err(Error::from))
            .collect()
    };
    Ok(CompiledPatterns {
        include: compile(&patterns.include)?,
        exclude: compile(&patterns.exclude)?,
    })
}

fn matches_patterns(relative: &Path, compiled: Option<&CompiledPatterns>) -> bool {
    let Some(compiled) = compiled else {
        return true;
    };
    let candidate = relative.to_string_lossy();
    let included = compiled.include.is_empty()
        || compiled.include.iter().any(|p| p.matches(&candidate));
    let excluded = compiled.exclude.iter().any(|p| p.matches(&candidate));
    included && !excluded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("src/app.ts"), "export {};\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme\n").unwrap();
        dir
    }

    #[test]
    fn test_missing_root_is_distinct_error() {
        let discovery = WalkerDiscovery::new();
        let err = discovery
            .discover_files(Path::new("/definitely/not/here"), None)
            .unwrap_err();
        assert!(matches!(err, Error::RootPathMissing(_)));
    }

    #[test]
    fn test_discovers_all_files_without_patterns() {
        let dir = fixture();
        let discovery = WalkerDiscovery::new();
        let files = discovery.discover_files(dir.path(), None).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_include_and_exclude_patterns() {
        let dir = fixture();
        let discovery = WalkerDiscovery::new();
        let patterns = DiscoveryPatterns::new(
            vec!["src/**/*".to_string()],
            vec!["**/*.ts".to_string()],
        );
        let files = discovery
            .discover_files(dir.path(), Some(&patterns))
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/main.rs"));
    }

    #[test]
    fn test_results_are_sorted() {
        let dir = fixture();
        let discovery = WalkerDiscovery::new();
        let files = discovery.discover_files(dir.path(), None).unwrap();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }
}
