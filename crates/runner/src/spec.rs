//! Test units and their discovery on disk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VisregError, VisregResult};

/// One test definition handed to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Absolute path to the test definition
    pub source_path: PathBuf,

    /// Path as given by the operator, used for reporting
    pub display_path: PathBuf,

    /// Directory of `display_path`, used to derive output subfolders
    pub folder: PathBuf,
}

impl TestSpec {
    /// Create a spec from a (possibly relative) path
    pub fn new(path: impl Into<PathBuf>) -> VisregResult<Self> {
        let display_path = path.into();
        let source_path = if display_path.is_absolute() {
            display_path.clone()
        } else {
            std::env::current_dir()?.join(&display_path)
        };
        let folder = display_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            source_path,
            display_path,
            folder,
        })
    }

    /// Name used in log lines and reports
    pub fn name(&self) -> String {
        self.display_path.display().to_string()
    }

    /// Expand files and directories into an ordered list of specs
    ///
    /// Files are kept as given. Directories are walked for files whose
    /// extension is in `extensions`, sorted by name. Input order is kept.
    pub fn discover(inputs: &[PathBuf], extensions: &[String]) -> VisregResult<Vec<Self>> {
        let mut specs = Vec::new();

        for input in inputs {
            if input.is_file() {
                specs.push(Self::new(input.clone())?);
            } else if input.is_dir() {
                for entry in walkdir::WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| has_extension(e.path(), extensions))
                {
                    specs.push(Self::new(entry.path().to_path_buf())?);
                }
            } else {
                return Err(VisregError::Config(format!(
                    "Test input not found: {}",
                    input.display()
                )));
            }
        }

        Ok(specs)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.trim_start_matches('.') == ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_relative_spec() {
        let spec = TestSpec::new("tests/header.js").unwrap();
        assert!(spec.source_path.is_absolute());
        assert!(spec.source_path.ends_with("tests/header.js"));
        assert_eq!(spec.display_path, PathBuf::from("tests/header.js"));
        assert_eq!(spec.folder, PathBuf::from("tests"));
        assert_eq!(spec.name(), "tests/header.js");
    }

    #[test]
    fn test_discover_walks_directories_in_order() {
        let tmp = TempDir::new().unwrap();
        let suite = tmp.path().join("suite");
        fs::create_dir_all(suite.join("nested")).unwrap();
        fs::write(suite.join("b.js"), "").unwrap();
        fs::write(suite.join("a.js"), "").unwrap();
        fs::write(suite.join("notes.txt"), "").unwrap();
        fs::write(suite.join("nested/c.js"), "").unwrap();

        let single = tmp.path().join("single.js");
        fs::write(&single, "").unwrap();

        let specs = TestSpec::discover(
            &[single.clone(), suite.clone()],
            &["js".to_string()],
        )
        .unwrap();

        let names: Vec<PathBuf> = specs.iter().map(|s| s.display_path.clone()).collect();
        assert_eq!(
            names,
            vec![
                single,
                suite.join("a.js"),
                suite.join("b.js"),
                suite.join("nested/c.js"),
            ]
        );
    }

    #[test]
    fn test_discover_missing_input() {
        let err = TestSpec::discover(&[PathBuf::from("/nonexistent/test.js")], &["js".to_string()])
            .unwrap_err();
        assert!(matches!(err, VisregError::Config(_)));
    }
}
