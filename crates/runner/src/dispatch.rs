//! Routes decoded channel events to their handlers

use tracing::{debug, info, warn};

use crate::aggregate::ResultAggregator;
use crate::artifacts::ArtifactManager;
use crate::error::{VisregError, VisregResult};
use crate::event::{Event, TestRecord};

/// Applies channel events to one test run's state
#[derive(Debug)]
pub struct EventDispatcher {
    aggregator: ResultAggregator,
    artifacts: ArtifactManager,
    no_new_baselines: bool,
}

impl EventDispatcher {
    pub fn new(artifacts: ArtifactManager, no_new_baselines: bool) -> Self {
        Self {
            aggregator: ResultAggregator::new(),
            artifacts,
            no_new_baselines,
        }
    }

    /// Decode and handle one raw record
    ///
    /// Records that fail to decode are logged and skipped. The only error
    /// returned is a new baseline while baselines are disallowed.
    pub fn dispatch(&mut self, record: &str) -> VisregResult<()> {
        debug!("worker: {}", record);

        match Event::decode(record) {
            Ok(event) => self.handle(event),
            Err(e) => {
                warn!("Skipping channel record: {}", e);
                Ok(())
            }
        }
    }

    pub fn handle(&mut self, event: Event) -> VisregResult<()> {
        match event {
            Event::Pass(test) => self.on_pass(&test),
            Event::Fail(test) => self.on_fail(&test),
            Event::Timeout(test) => self.on_timeout(&test),
            Event::NewImage(test) => return self.on_new_image(&test),
            Event::Complete {
                all_tests,
                failed,
                errored,
            } => self.aggregator.complete(all_tests.len(), failed, errored),
            Event::Unknown(name) => debug!("Ignoring unknown event {}", name),
        }
        Ok(())
    }

    fn on_pass(&mut self, test: &TestRecord) {
        self.aggregator.record_pass();
        info!("No changes found for {}", test.basename());
    }

    fn on_fail(&mut self, test: &TestRecord) {
        self.aggregator.record_mismatch();
        match test.mismatch {
            Some(mismatch) => warn!(
                "Visual change found for {} ({}% mismatch)",
                test.basename(),
                mismatch
            ),
            None => warn!("Visual change found for {}", test.basename()),
        }
        self.artifacts.archive_failure(test);
    }

    fn on_timeout(&mut self, test: &TestRecord) {
        self.aggregator.record_timeout();
        warn!("Timeout while processing {}", test.basename());
    }

    fn on_new_image(&mut self, test: &TestRecord) -> VisregResult<()> {
        if self.no_new_baselines {
            return Err(VisregError::NewBaselineDisallowed {
                filename: test.basename(),
            });
        }

        self.aggregator.record_new_image();
        info!("New baseline captured: {}", test.filename.display());
        Ok(())
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dispatcher(tmp: &TempDir, no_new_baselines: bool) -> EventDispatcher {
        let artifacts =
            ArtifactManager::new(tmp.path().join("screenshots"), tmp.path().join("failures"));
        fs::create_dir_all(artifacts.screenshots_dir()).unwrap();
        EventDispatcher::new(artifacts, no_new_baselines)
    }

    #[test]
    fn test_fail_then_complete_archives_and_fails() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, false);
        let shot = tmp.path().join("screenshots/a.png");
        fs::write(&shot, b"shot").unwrap();
        fs::write(tmp.path().join("screenshots/a.diff.png"), b"diff").unwrap();

        let fail = serde_json::json!(["onFail", {"filename": shot, "mismatch": 3.2}]).to_string();
        let complete = serde_json::json!(["onComplete", [{"filename": shot}], 1, 0]).to_string();
        dispatcher.dispatch(&fail).unwrap();
        dispatcher.dispatch(&complete).unwrap();

        assert!(!dispatcher.aggregator().succeeded());
        assert_eq!(dispatcher.aggregator().failure_count(), 1);
        assert_eq!(dispatcher.aggregator().mismatches(), 1);
        assert!(tmp.path().join("failures/a.png").exists());
        assert!(tmp.path().join("failures/a.diff.png").exists());
    }

    #[test]
    fn test_empty_complete_succeeds() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, false);
        dispatcher.dispatch(r#"["onComplete",[],0,0]"#).unwrap();
        assert!(dispatcher.aggregator().succeeded());
        assert!(dispatcher.aggregator().completed());
    }

    #[test]
    fn test_complete_with_oversized_counts_still_fails() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, false);
        dispatcher
            .dispatch(r#"["onComplete",[{"filename":"a.png"}],4294967295,1]"#)
            .unwrap();
        assert!(!dispatcher.aggregator().succeeded());
        assert_eq!(dispatcher.aggregator().failure_count(), u32::MAX);
    }

    #[test]
    fn test_new_image_disallowed_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, true);
        let err = dispatcher
            .dispatch(r#"["onNewImage",{"filename":"shots/home_0.png"}]"#)
            .unwrap_err();
        match err {
            VisregError::NewBaselineDisallowed { filename } => assert_eq!(filename, "home_0.png"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_new_image_allowed_is_counted() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, false);
        dispatcher
            .dispatch(r#"["onNewImage",{"filename":"shots/home_0.png"}]"#)
            .unwrap();
        assert_eq!(dispatcher.aggregator().new_images(), 1);
        assert!(dispatcher.aggregator().succeeded());
    }

    #[test]
    fn test_unknown_and_malformed_records_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(&tmp, true);
        dispatcher.dispatch(r#"["onCapture",{"filename":"x.png"}]"#).unwrap();
        dispatcher.dispatch("{broken").unwrap();
        dispatcher.dispatch(r#"["onPass",{"filename":"x.png"}]"#).unwrap();
        assert_eq!(dispatcher.aggregator().passed(), 1);
    }
}
