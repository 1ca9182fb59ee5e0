//! Suite configuration and the per-test configuration handed to the worker

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{VisregError, VisregResult};
use crate::spec::TestSpec;

/// Verbosity forwarded to the worker process
///
/// Config files accept the same spellings as the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level '{}' (expected debug, info, warning or error)",
                other
            )),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        s.parse()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared base configuration for a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// URL prefix forwarded to the worker for test content
    pub root_url: Option<String>,

    /// Root all output directories are relative to
    pub base_url: PathBuf,

    /// Screenshot directory, relative to `base_url`
    pub screenshots: PathBuf,

    /// Results directory, relative to `base_url`
    pub results: PathBuf,

    /// Failure archive directory, relative to `base_url`
    pub failures: PathBuf,

    /// Viewport as `[width, height]`
    pub viewport_size: [u32; 2],

    /// Largest tolerated fraction of differing pixels
    pub mismatch_tolerance: f64,

    /// How long the worker waits before giving up on content
    pub wait_timeout_ms: u64,

    /// Worker verbosity
    pub log_level: LogLevel,

    /// Replace existing baselines with fresh captures
    pub rebase: bool,

    /// Treat a freshly captured baseline as a fatal error
    pub no_new_screenshot: bool,

    /// Worker process settings
    pub worker: WorkerOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root_url: None,
            base_url: PathBuf::from("."),
            screenshots: PathBuf::from("screenshots"),
            results: PathBuf::from("results"),
            failures: PathBuf::from("failures"),
            viewport_size: [1280, 800],
            mismatch_tolerance: 0.05,
            wait_timeout_ms: 5000,
            log_level: LogLevel::Warning,
            rebase: false,
            no_new_screenshot: false,
            worker: WorkerOptions::default(),
        }
    }
}

/// How the worker process is started
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    /// Headless engine binary
    pub executable: PathBuf,

    /// Script the engine runs; receives the serialized `RunConfig`
    pub runner_script: PathBuf,

    /// Location of the comparison library, forwarded to the runner script
    pub engine_path: Option<PathBuf>,

    /// Channel polling interval
    pub poll_interval_ms: u64,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("phantomjs"),
            runner_script: PathBuf::from("phantomjs/runner.js"),
            engine_path: None,
            poll_interval_ms: 100,
        }
    }
}

impl Options {
    /// Load options from a TOML file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> VisregResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let options: Self = toml::from_str(&content)?;
            Ok(options)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate and anchor the output directories under `base_url`
    pub fn resolve(&self) -> VisregResult<ResolvedOptions> {
        if !(0.0..=1.0).contains(&self.mismatch_tolerance) {
            return Err(VisregError::Config(format!(
                "mismatch_tolerance must be between 0 and 1, got {}",
                self.mismatch_tolerance
            )));
        }
        if self.viewport_size.contains(&0) {
            return Err(VisregError::Config(format!(
                "viewport_size must be non-zero, got {}x{}",
                self.viewport_size[0], self.viewport_size[1]
            )));
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(VisregError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        let absolute_base_url = if self.base_url.is_absolute() {
            self.base_url.clone()
        } else {
            std::env::current_dir()?.join(&self.base_url)
        };

        Ok(ResolvedOptions {
            root_url: self.root_url.clone(),
            absolute_base_url,
            screenshots: self.base_url.join(&self.screenshots),
            results: self.base_url.join(&self.results),
            failures: self.base_url.join(&self.failures),
            base_url: self.base_url.clone(),
            viewport_size: self.viewport_size,
            mismatch_tolerance: self.mismatch_tolerance,
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            log_level: self.log_level,
            rebase: self.rebase,
            no_new_screenshot: self.no_new_screenshot,
            worker: self.worker.clone(),
        })
    }
}

/// Options after validation, with output directories anchored at the base
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub root_url: Option<String>,
    pub base_url: PathBuf,
    pub absolute_base_url: PathBuf,
    pub screenshots: PathBuf,
    pub results: PathBuf,
    pub failures: PathBuf,
    pub viewport_size: [u32; 2],
    pub mismatch_tolerance: f64,
    pub wait_timeout: Duration,
    pub log_level: LogLevel,
    pub rebase: bool,
    pub no_new_screenshot: bool,
    pub worker: WorkerOptions,
}

impl ResolvedOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker.poll_interval_ms)
    }

    /// Subfolder appended to every output directory for `test`
    ///
    /// The test folder is taken relative to the base (or its absolute form);
    /// only normal components survive, so `./a/../b` style prefixes never
    /// escape the output roots.
    pub fn output_postfix(&self, test: &TestSpec) -> PathBuf {
        let relative = test
            .folder
            .strip_prefix(&self.base_url)
            .or_else(|_| test.folder.strip_prefix(&self.absolute_base_url))
            .unwrap_or(&test.folder);

        relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect()
    }
}

/// Fully resolved configuration for one worker invocation
///
/// Serialized as a single JSON argument; key names are part of the worker
/// protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    pub base_url: PathBuf,
    pub absolute_base_url: PathBuf,
    pub screenshots: PathBuf,
    pub results: PathBuf,
    pub failures: PathBuf,
    pub viewport_size: [u32; 2],
    pub mismatch_tolerance: f64,
    /// Milliseconds
    pub wait_timeout: u64,
    pub log_level: LogLevel,
    pub test: PathBuf,
    pub test_folder: PathBuf,
    pub rebase: bool,
    pub no_new_screenshot: bool,
    pub channel_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_path: Option<PathBuf>,
}

impl RunConfig {
    /// Build the configuration for a single test from the shared base
    pub fn for_test(resolved: &ResolvedOptions, test: &TestSpec, channel_file: &Path) -> Self {
        let postfix = resolved.output_postfix(test);
        let suffixed = |dir: &Path| {
            if postfix.as_os_str().is_empty() {
                dir.to_path_buf()
            } else {
                dir.join(&postfix)
            }
        };

        Self {
            root_url: resolved.root_url.clone(),
            base_url: resolved.base_url.clone(),
            absolute_base_url: resolved.absolute_base_url.clone(),
            screenshots: suffixed(&resolved.screenshots),
            results: suffixed(&resolved.results),
            failures: suffixed(&resolved.failures),
            viewport_size: resolved.viewport_size,
            mismatch_tolerance: resolved.mismatch_tolerance,
            wait_timeout: resolved.wait_timeout.as_millis() as u64,
            log_level: resolved.log_level,
            test: test.source_path.clone(),
            test_folder: test.folder.clone(),
            rebase: resolved.rebase,
            no_new_screenshot: resolved.no_new_screenshot,
            channel_file: channel_file.to_path_buf(),
            engine_path: resolved.worker.engine_path.clone(),
        }
    }

    pub fn to_json(&self) -> VisregResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
