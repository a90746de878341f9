//! Source file discovery

use eyre::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Predicate over a bare file name deciding whether it is included
pub type NameFilter<'a> = &'a dyn Fn(&str) -> bool;

/// Walks source roots and returns contract files in traversal order
#[derive(Debug, Clone)]
pub struct SourceDiscovery {
    /// File name suffix of contract sources, e.g. `.sol`
    pub suffix: String,
    /// Root that receives `extra_test_source` after its own files
    pub tests_root: Option<PathBuf>,
    /// Extra file appended to the tests root listing
    pub extra_test_source: Option<PathBuf>,
}

impl Default for SourceDiscovery {
    fn default() -> Self {
        Self {
            suffix: ".sol".to_string(),
            tests_root: None,
            extra_test_source: None,
        }
    }
}

impl SourceDiscovery {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ..Self::default()
        }
    }

    /// Appends `extra` to every discovery rooted at `tests_root`
    pub fn with_tests_root(mut self, tests_root: PathBuf, extra: Option<PathBuf>) -> Self {
        self.tests_root = Some(tests_root);
        self.extra_test_source = extra;
        self
    }

    /// Returns every file under `root` whose name ends with the suffix and
    /// passes `filter`.
    ///
    /// Entries of each directory are visited in file name order and
    /// directories are descended into at their sorted position. Symlinks are
    /// followed. A missing root is an error.
    pub fn discover(&self, root: &Path, filter: Option<NameFilter<'_>>) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to walk source directory: {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(&self.suffix) {
                continue;
            }
            if filter.map_or(true, |accept| accept(name.as_str())) {
                tracing::debug!("Discovered {}", entry.path().display());
                files.push(entry.into_path());
            }
        }

        if self.tests_root.as_deref() == Some(root) {
            if let Some(extra) = &self.extra_test_source {
                files.push(extra.clone());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "contract X {}").unwrap();
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_depth_first_sorted_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b.sol");
        touch(temp.path(), "a/z.sol");
        touch(temp.path(), "a/nested/y.sol");
        touch(temp.path(), "c.sol");
        touch(temp.path(), "README.md");

        let files = SourceDiscovery::default().discover(temp.path(), None).unwrap();
        assert_eq!(
            names(temp.path(), &files),
            vec!["a/nested/y.sol", "a/z.sol", "b.sol", "c.sol"]
        );
    }

    #[test]
    fn test_filter_sees_file_name() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Token.sol");
        touch(temp.path(), "mocks/MockToken.sol");

        let discovery = SourceDiscovery::default();
        let only_mocks: NameFilter<'_> = &|name: &str| name.contains("Mock");
        let files = discovery.discover(temp.path(), Some(only_mocks)).unwrap();
        assert_eq!(names(temp.path(), &files), vec!["mocks/MockToken.sol"]);
    }

    #[test]
    fn test_no_matching_files_is_empty() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "notes.txt");
        let files = SourceDiscovery::default().discover(temp.path(), None).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_tests_root_gets_extra_source() {
        let temp = TempDir::new().unwrap();
        let tests_root = temp.path().join("test");
        fs::create_dir_all(&tests_root).unwrap();
        let extra = temp.path().join("script/LibDeploy.sol");

        let discovery = SourceDiscovery::default()
            .with_tests_root(tests_root.clone(), Some(extra.clone()));
        assert_eq!(discovery.discover(&tests_root, None).unwrap(), vec![extra]);

        // other roots are unaffected
        let contracts_root = temp.path().join("contracts");
        fs::create_dir_all(&contracts_root).unwrap();
        assert!(discovery.discover(&contracts_root, None).unwrap().is_empty());
    }

    #[test]
    fn test_rerun_sees_new_files() {
        let temp = TempDir::new().unwrap();
        let discovery = SourceDiscovery::default();
        assert!(discovery.discover(temp.path(), None).unwrap().is_empty());
        touch(temp.path(), "Late.sol");
        assert_eq!(discovery.discover(temp.path(), None).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let result = SourceDiscovery::default().discover(Path::new("/non/existent/root"), None);
        assert!(result.is_err());
    }
}
