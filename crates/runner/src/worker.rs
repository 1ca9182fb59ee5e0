//! Worker process launch and the channel polling loop that runs beside it

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::channel::EventChannel;
use crate::config::{RunConfig, WorkerOptions};
use crate::error::{VisregError, VisregResult};

/// Environment variable carrying the channel location to the worker
pub const CHANNEL_ENV: &str = "VISREG_CHANNEL_FILE";

/// How to start the external rendering worker
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub executable: PathBuf,
    pub runner_script: PathBuf,

    /// Directory the worker runs in, so relative fixtures in tests resolve
    /// against the orchestrator's own working directory
    pub working_dir: PathBuf,
}

impl WorkerCommand {
    pub fn new(
        executable: impl Into<PathBuf>,
        runner_script: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            runner_script: runner_script.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Build a command from worker options, running in the current directory
    pub fn from_options(options: &WorkerOptions) -> VisregResult<Self> {
        Ok(Self::new(
            &options.executable,
            &options.runner_script,
            std::env::current_dir()?,
        ))
    }

    /// Start one worker for `config`
    ///
    /// Standard streams are inherited so the worker's own diagnostics reach
    /// the operator directly.
    pub fn launch(&self, config: &RunConfig) -> VisregResult<WorkerHandle> {
        let payload = config.to_json()?;

        debug!(
            "Launching {} {}",
            self.executable.display(),
            self.runner_script.display()
        );

        let child = Command::new(&self.executable)
            .arg(&self.runner_script)
            .arg(payload)
            .env(CHANNEL_ENV, &config.channel_file)
            .current_dir(&self.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VisregError::Launch {
                executable: self.executable.clone(),
                source,
            })?;

        Ok(WorkerHandle { child })
    }
}

/// A running worker process
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
}

impl WorkerHandle {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the worker and reap it
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill worker: {}", e);
        }
    }
}

/// How a worker process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited on its own; `code` is `None` when killed by a signal
    Exited { success: bool, code: Option<i32> },

    /// Waiting on the process failed
    Lost,
}

impl WorkerExit {
    fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => WorkerExit::Exited {
                success: status.success(),
                code: status.code(),
            },
            Err(e) => {
                warn!("Failed to wait for worker: {}", e);
                WorkerExit::Lost
            }
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, WorkerExit::Exited { success: true, .. })
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            WorkerExit::Exited { code, .. } => *code,
            WorkerExit::Lost => None,
        }
    }
}

enum Stop {
    Exited(std::io::Result<ExitStatus>),
    Aborted(VisregError),
}

/// Poll `channel` while `worker` runs, handing each new record to `on_record`
///
/// Once the worker exits the channel is drained one final time, so records
/// written just before exit are still delivered. Read errors while the worker
/// runs are logged and retried on the next tick; a failed final read is
/// returned. An error from `on_record`
/// stops polling, kills the worker and is returned.
pub async fn pump<F>(
    channel: &mut EventChannel,
    worker: &mut WorkerHandle,
    interval: Duration,
    mut on_record: F,
) -> VisregResult<WorkerExit>
where
    F: FnMut(&str) -> VisregResult<()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stop = {
        let exit = worker.child.wait();
        tokio::pin!(exit);

        loop {
            tokio::select! {
                status = &mut exit => break Stop::Exited(status),
                _ = ticker.tick() => match channel.poll_new().await {
                    Ok(records) => {
                        if let Err(e) = deliver(&records, &mut on_record) {
                            break Stop::Aborted(e);
                        }
                    }
                    // The post-exit read retries whatever this one missed
                    Err(e) => warn!(
                        "Failed to read event channel {}: {}",
                        channel.path().display(),
                        e
                    ),
                }
            }
        }
    };

    match stop {
        Stop::Exited(status) => {
            let exit = WorkerExit::from_status(status);
            debug!("Worker exited: {:?}", exit);
            let records = channel.poll_new().await?;
            deliver(&records, &mut on_record)?;
            Ok(exit)
        }
        Stop::Aborted(e) => {
            info!("Stopping worker: {}", e);
            worker.kill().await;
            Err(e)
        }
    }
}

fn deliver<F>(records: &[String], on_record: &mut F) -> VisregResult<()>
where
    F: FnMut(&str) -> VisregResult<()>,
{
    for record in records {
        on_record(record)?;
    }
    Ok(())
}
