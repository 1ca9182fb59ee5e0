//! visreg runner
//!
//! Drives visual regression suites through an external headless worker:
//! - Runs one worker process per test, strictly in sequence
//! - Reads the worker's progress through an append-only, file-backed channel
//! - Aggregates pass/fail counts and decides each test's outcome
//! - Cleans up and archives diff images around every run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                  │
//! │    └── for each TestSpec (stop at first failure)            │
//! │          WorkerExecutor                                     │
//! │            ├── ArtifactManager::reset_prior_artifacts()     │
//! │            ├── WorkerCommand::launch(RunConfig)             │
//! │            ├── pump(EventChannel) ──► EventDispatcher       │
//! │            │        (final drain after exit)   │            │
//! │            │                  ResultAggregator ┘            │
//! │            └── ArtifactManager::final_cleanup()             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod aggregate;
pub mod artifacts;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod report;
pub mod scheduler;
pub mod spec;
pub mod worker;

pub use aggregate::ResultAggregator;
pub use artifacts::ArtifactManager;
pub use channel::EventChannel;
pub use config::{LogLevel, Options, ResolvedOptions, RunConfig, WorkerOptions};
pub use dispatch::EventDispatcher;
pub use error::{VisregError, VisregResult};
pub use event::{Event, TestRecord};
pub use report::{SuiteReport, TestOutcome};
pub use scheduler::{Scheduler, SchedulerState, TestExecutor, WorkerExecutor};
pub use spec::TestSpec;
pub use worker::{WorkerCommand, WorkerExit, WorkerHandle};
