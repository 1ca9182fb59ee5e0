//! Sequential scheduling of tests, one worker at a time

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactManager;
use crate::channel::EventChannel;
use crate::config::{ResolvedOptions, RunConfig};
use crate::dispatch::EventDispatcher;
use crate::error::VisregResult;
use crate::report::{SuiteReport, TestOutcome};
use crate::spec::TestSpec;
use crate::worker::{pump, WorkerCommand, WorkerExit};

/// Position of the scheduler in its queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running(usize),
    /// Stopped after the test at this index failed
    Aborted(usize),
    Completed,
}

impl SchedulerState {
    /// Leave `Idle` for a queue of `len` tests
    pub fn begin(self, len: usize) -> Self {
        match self {
            SchedulerState::Idle if len == 0 => SchedulerState::Completed,
            SchedulerState::Idle => SchedulerState::Running(0),
            other => other,
        }
    }

    /// Transition once the running test has finished
    pub fn advance(self, succeeded: bool, len: usize) -> Self {
        match self {
            SchedulerState::Running(index) if !succeeded => SchedulerState::Aborted(index),
            SchedulerState::Running(index) if index + 1 < len => SchedulerState::Running(index + 1),
            SchedulerState::Running(_) => SchedulerState::Completed,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerState::Aborted(_) | SchedulerState::Completed)
    }
}

/// Runs a single test to an outcome
///
/// An `Err` is a hard failure that terminates the whole sequence.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, test: &TestSpec) -> VisregResult<TestOutcome>;
}

/// Runs tests in order and stops at the first failure
pub struct Scheduler<E> {
    executor: E,
}

impl<E: TestExecutor> Scheduler<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `tests` one at a time
    pub async fn run(&self, tests: &[TestSpec]) -> VisregResult<SuiteReport> {
        let start = Instant::now();
        let mut report = SuiteReport {
            total: tests.len(),
            ..Default::default()
        };

        info!("Running {} test(s)...", tests.len());

        let mut state = SchedulerState::Idle.begin(tests.len());
        while let SchedulerState::Running(index) = state {
            let test = &tests[index];
            info!("Running: {}", test.name());

            let outcome = self.executor.execute(test).await?;
            let succeeded = outcome.succeeded;
            if succeeded {
                report.passed += 1;
                info!("✓ {} ({} ms)", test.name(), outcome.duration_ms);
            } else {
                report.failed += 1;
                error!("✗ {} ({} failure(s))", test.name(), outcome.failure_count);
            }
            report.results.push(outcome);

            state = state.advance(succeeded, tests.len());
        }

        report.not_run = tests.len() - report.results.len();
        report.duration_ms = start.elapsed().as_millis() as u64;

        match state {
            SchedulerState::Aborted(index) => error!(
                "Aborted at {}: {} passed, {} failed, {} not run ({} ms)",
                tests[index].name(),
                report.passed,
                report.failed,
                report.not_run,
                report.duration_ms
            ),
            _ => info!(
                "Test Results: {} passed, {} failed ({} ms)",
                report.passed, report.failed, report.duration_ms
            ),
        }

        Ok(report)
    }
}

/// Executes each test in its own worker process
#[derive(Debug, Clone)]
pub struct WorkerExecutor {
    options: ResolvedOptions,
    command: WorkerCommand,
}

impl WorkerExecutor {
    pub fn new(options: ResolvedOptions, command: WorkerCommand) -> Self {
        Self { options, command }
    }

    /// Use the worker settings from `options`, running in the current directory
    pub fn from_options(options: ResolvedOptions) -> VisregResult<Self> {
        let command = WorkerCommand::from_options(&options.worker)?;
        Ok(Self::new(options, command))
    }

    async fn run_worker(
        &self,
        config: &RunConfig,
        channel: &mut EventChannel,
        dispatcher: &mut EventDispatcher,
    ) -> VisregResult<WorkerExit> {
        let mut worker = self.command.launch(config)?;
        debug!("Worker started (pid {:?})", worker.id());

        pump(channel, &mut worker, self.options.poll_interval(), |record| {
            dispatcher.dispatch(record)
        })
        .await
    }
}

#[async_trait]
impl TestExecutor for WorkerExecutor {
    async fn execute(&self, test: &TestSpec) -> VisregResult<TestOutcome> {
        let start = Instant::now();

        let mut channel = EventChannel::temporary()?;
        let config = RunConfig::for_test(&self.options, test, channel.path());
        let artifacts = ArtifactManager::new(&config.screenshots, &config.failures);
        artifacts.reset_prior_artifacts();

        let mut dispatcher = EventDispatcher::new(artifacts.clone(), config.no_new_screenshot);
        let result = self.run_worker(&config, &mut channel, &mut dispatcher).await;
        artifacts.final_cleanup(channel);
        let exit = result?;

        let aggregator = dispatcher.aggregator();
        let succeeded = if !exit.success() && !aggregator.completed() {
            warn!(
                "Worker for {} ended ({:?}) without reporting completion",
                test.name(),
                exit
            );
            false
        } else {
            aggregator.succeeded()
        };

        Ok(TestOutcome {
            display_path: test.display_path.clone(),
            succeeded,
            failure_count: aggregator.failure_count(),
            passed: aggregator.passed(),
            mismatches: aggregator.mismatches(),
            timeouts: aggregator.timeouts(),
            new_images: aggregator.new_images(),
            exit_code: exit.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
