//! Outcome records for tests and suites

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::VisregResult;

/// Outcome of one worker run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub display_path: PathBuf,
    pub succeeded: bool,

    /// Failed plus errored comparisons, as reported on completion
    pub failure_count: u32,

    pub passed: u32,
    pub mismatches: u32,
    pub timeouts: u32,
    pub new_images: u32,

    /// Worker exit code, `None` when it was killed by a signal or lost
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
}

/// Outcome of a whole scheduled sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Tests skipped because an earlier one failed
    pub not_run: usize,

    pub duration_ms: u64,
    pub results: Vec<TestOutcome>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> VisregResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Results written to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reports/visreg.json");
        let report = SuiteReport {
            total: 2,
            passed: 1,
            failed: 1,
            not_run: 0,
            duration_ms: 12,
            results: vec![TestOutcome {
                display_path: PathBuf::from("tests/a.js"),
                succeeded: false,
                failure_count: 1,
                passed: 0,
                mismatches: 1,
                timeouts: 0,
                new_images: 0,
                exit_code: Some(0),
                duration_ms: 12,
            }],
        };

        report.write_json(&path).unwrap();
        let loaded: SuiteReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.failed, 1);
        assert!(!loaded.success());
        assert_eq!(loaded.results[0].display_path, PathBuf::from("tests/a.js"));
    }
}
