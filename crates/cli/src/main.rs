//! visreg - Main Entry Point
//!
//! Runs visual regression suites one test at a time through a headless
//! rendering worker and exits non-zero when any test fails.

use anyhow::Context;
use clap::{Args, Parser};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use visreg_runner::{LogLevel, Options, Scheduler, TestSpec, WorkerExecutor};

mod output;

/// visreg - visual regression test runner
#[derive(Parser)]
#[command(name = "visreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Test files or directories containing tests
    tests: Vec<PathBuf>,

    /// Configuration file (TOML); missing files fall back to defaults
    #[arg(short, long, env = "VISREG_CONFIG", default_value = "visreg.toml")]
    config: PathBuf,

    /// Test file extension used when walking directories (repeatable)
    #[arg(long = "extension", default_value = "js")]
    extensions: Vec<String>,

    #[command(flatten)]
    overrides: Overrides,

    /// Write the suite report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output format for the final summary
    #[arg(long, value_enum, default_value = "table")]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Command line values that take precedence over the configuration file
#[derive(Args, Debug)]
struct Overrides {
    /// Root directory for screenshots, results and failures
    #[arg(long)]
    base_url: Option<PathBuf>,

    /// URL prefix forwarded to the worker
    #[arg(long)]
    root_url: Option<String>,

    /// Screenshot directory (relative to the base)
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Results directory (relative to the base)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Failure archive directory (relative to the base)
    #[arg(long)]
    failures: Option<PathBuf>,

    /// Viewport width
    #[arg(long)]
    viewport_width: Option<u32>,

    /// Viewport height
    #[arg(long)]
    viewport_height: Option<u32>,

    /// Largest tolerated fraction of differing pixels (0.0 - 1.0)
    #[arg(long)]
    mismatch_tolerance: Option<f64>,

    /// Worker wait timeout in milliseconds
    #[arg(long)]
    wait_timeout: Option<u64>,

    /// Worker log level (debug, info, warning, error)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Worker executable
    #[arg(long, env = "VISREG_WORKER")]
    worker: Option<PathBuf>,

    /// Script the worker executes
    #[arg(long)]
    runner_script: Option<PathBuf>,

    /// Comparison library location forwarded to the runner script
    #[arg(long)]
    engine_path: Option<PathBuf>,

    /// Channel polling interval in milliseconds
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Replace existing baselines with fresh captures
    #[arg(long)]
    rebase: bool,

    /// Fail immediately when a new baseline would be created
    #[arg(long)]
    no_new_screenshot: bool,
}

impl Overrides {
    fn apply(self, options: &mut Options) {
        if let Some(v) = self.base_url {
            options.base_url = v;
        }
        if let Some(v) = self.root_url {
            options.root_url = Some(v);
        }
        if let Some(v) = self.screenshots {
            options.screenshots = v;
        }
        if let Some(v) = self.results {
            options.results = v;
        }
        if let Some(v) = self.failures {
            options.failures = v;
        }
        if let Some(v) = self.viewport_width {
            options.viewport_size[0] = v;
        }
        if let Some(v) = self.viewport_height {
            options.viewport_size[1] = v;
        }
        if let Some(v) = self.mismatch_tolerance {
            options.mismatch_tolerance = v;
        }
        if let Some(v) = self.wait_timeout {
            options.wait_timeout_ms = v;
        }
        if let Some(v) = self.log_level {
            options.log_level = v;
        }
        if let Some(v) = self.worker {
            options.worker.executable = v;
        }
        if let Some(v) = self.runner_script {
            options.worker.runner_script = v;
        }
        if let Some(v) = self.engine_path {
            options.worker.engine_path = Some(v);
        }
        if let Some(v) = self.poll_interval {
            options.worker.poll_interval_ms = v;
        }
        options.rebase |= self.rebase;
        options.no_new_screenshot |= self.no_new_screenshot;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut options = Options::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    cli.overrides.apply(&mut options);
    let resolved = options.resolve()?;

    let tests = TestSpec::discover(&cli.tests, &cli.extensions)?;
    if tests.is_empty() {
        warn!("No tests found");
    }
    if resolved.rebase {
        info!("Rebasing: existing baselines will be replaced");
    }

    let scheduler = Scheduler::new(WorkerExecutor::from_options(resolved)?);
    let report = scheduler.run(&tests).await?;

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    output::print_report(&report, cli.format);

    Ok(report.success())
}
