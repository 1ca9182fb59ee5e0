//! Per-test pass/fail accounting

use tracing::{error, info};

/// Tallies the events of a single worker run
///
/// A fresh aggregator is created for every test, so counts never leak from
/// one test into the next.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    failure_count: u32,
    passed: u32,
    mismatches: u32,
    timeouts: u32,
    new_images: u32,
    completed: bool,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self) {
        self.passed = self.passed.saturating_add(1);
    }

    pub fn record_mismatch(&mut self) {
        self.mismatches = self.mismatches.saturating_add(1);
    }

    /// Timeouts are only counted for reporting; the failure count comes from
    /// the completion event.
    pub fn record_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
    }

    pub fn record_new_image(&mut self) {
        self.new_images = self.new_images.saturating_add(1);
    }

    /// Apply the worker's completion summary
    ///
    /// An empty test list leaves the failure count untouched and logs
    /// nothing.
    pub fn complete(&mut self, total: usize, failed: u32, errored: u32) {
        self.completed = true;
        if total == 0 {
            return;
        }

        let passed = (total as u32).saturating_sub(self.failure_count);
        self.failure_count = failed.saturating_add(errored);

        if self.failure_count == 0 {
            info!("All {} tests passed!", passed);
        } else if errored == 0 {
            error!("{} tests failed.", failed);
        } else {
            error!("{} tests failed, {} had errors.", failed, errored);
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Whether the worker reported its completion summary
    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn passed(&self) -> u32 {
        self.passed
    }

    pub fn mismatches(&self) -> u32 {
        self.mismatches
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn new_images(&self) -> u32 {
        self.new_images
    }
}
