//! Blocking orchestration of one embedded suite run.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};

use tracing::{debug, info, warn};

use super::types::{
    ProtocolViolation, RunStatus, RunnerError, RunnerResult, ScreenshotArtifact, TestOutcome, TestRun,
};
use crate::config::RunnerConfig;
use crate::suite::{EmbeddedSuite, EventSender, SuiteEvent};

/// Cancels an in-flight run from another thread.
///
/// If no run is in flight, the next run is cancelled as soon as it starts waiting.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation is pending
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Drives an embedded suite and collects its results.
///
/// Each call to [`TestRunner::run_and_collect`] starts the suite, blocks until
/// the suite reports completion (or aborts), and hands every finished test to
/// the caller's sink in arrival order. Runs on one instance are serialized by
/// `&mut self`.
pub struct TestRunner {
    suite: Box<dyn EmbeddedSuite>,
    config: RunnerConfig,
    cancel: CancelHandle,
    last_run: Option<TestRun>,
}

impl TestRunner {
    /// Create a runner using configuration from the environment
    pub fn new(suite: impl EmbeddedSuite + 'static) -> Self {
        Self::with_config(suite, RunnerConfig::default())
    }

    /// Create a runner with explicit configuration
    pub fn with_config(suite: impl EmbeddedSuite + 'static, config: RunnerConfig) -> Self {
        Self {
            suite: Box::new(suite),
            config,
            cancel: CancelHandle::default(),
            last_run: None,
        }
    }

    /// Runner configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Handle that cancels this runner's runs
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The most recent run, complete or partial
    pub fn last_run(&self) -> Option<&TestRun> {
        self.last_run.as_ref()
    }

    /// Screenshots collected by the most recent run
    pub fn captured_screenshots_by_name(&self) -> &BTreeMap<String, ScreenshotArtifact> {
        static EMPTY: BTreeMap<String, ScreenshotArtifact> = BTreeMap::new();
        self.last_run.as_ref().map(|run| &run.screenshots).unwrap_or(&EMPTY)
    }

    /// Run the suite, calling `on_each_result` once per completed test.
    ///
    /// Returns the finished run, or an error if the suite aborted, broke the
    /// event protocol, or the run was cancelled. In every case the collected
    /// state stays available through [`TestRunner::last_run`].
    pub fn run_and_collect<F>(&mut self, mut on_each_result: F) -> RunnerResult<&TestRun>
    where
        F: FnMut(&TestOutcome),
    {
        self.try_run_and_collect(|outcome| {
            on_each_result(outcome);
            Ok::<(), Infallible>(())
        })
    }

    /// Like [`TestRunner::run_and_collect`], with a sink that may fail.
    ///
    /// The first sink error stops the run and is returned as [`RunnerError::Sink`].
    pub fn try_run_and_collect<F, E>(&mut self, mut on_each_result: F) -> RunnerResult<&TestRun, E>
    where
        F: FnMut(&TestOutcome) -> Result<(), E>,
    {
        let mut run = TestRun::new(self.suite.name());
        info!(suite = %run.suite, "starting suite");

        let (events, rx) = EventSender::channel();
        if let Err(err) = self.suite.start(events) {
            warn!(suite = %run.suite, error = %err, "suite failed to start");
            run.close(RunStatus::Aborted {
                reason: err.to_string(),
            });
            self.last_run = Some(run);
            return Err(RunnerError::SuiteStart(err));
        }

        let result = self.consume(&rx, &mut run, &mut on_each_result);
        drop(rx);
        if result.is_err() {
            self.suite.stop();
        }

        match &result {
            Ok(()) => info!(
                suite = %run.suite,
                passed = run.passed_count(),
                failed = run.failed_count(),
                screenshots = run.screenshots.len(),
                "suite finished"
            ),
            Err(_) => warn!(
                suite = %run.suite,
                status = ?run.status,
                collected = run.outcomes.len(),
                "suite ended early"
            ),
        }

        match result {
            Ok(()) => Ok(&*self.last_run.insert(run)),
            Err(err) => {
                self.last_run = Some(run);
                Err(err)
            }
        }
    }

    /// Apply events until the run reaches a terminal status
    fn consume<F, E>(
        &self,
        rx: &mpsc::Receiver<SuiteEvent>,
        run: &mut TestRun,
        on_each_result: &mut F,
    ) -> RunnerResult<(), E>
    where
        F: FnMut(&TestOutcome) -> Result<(), E>,
    {
        loop {
            if self.cancel.take() {
                run.close(RunStatus::Cancelled);
                return Err(RunnerError::Cancelled);
            }

            let event = match rx.recv_timeout(self.config.poll_interval) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    let reason = "suite stopped reporting before it finished".to_string();
                    run.close(RunStatus::Aborted {
                        reason: reason.clone(),
                    });
                    return Err(RunnerError::SuiteAborted { reason });
                }
            };
            debug!(event = %event.describe(), "suite event");

            match event {
                SuiteEvent::TestCompleted {
                    name,
                    success,
                    failure_message,
                } => {
                    let outcome = TestOutcome::new(name, success, failure_message);
                    if let Err(violation) = run.record_outcome(outcome) {
                        return Err(violate(run, violation));
                    }
                    if let Some(recorded) = run.outcomes.last() {
                        if let Err(err) = on_each_result(recorded) {
                            run.close(RunStatus::SinkFailed);
                            return Err(RunnerError::Sink(err));
                        }
                    }
                }
                SuiteEvent::ScreenshotCaptured { name, image_data } => {
                    if let Err(violation) = run.record_screenshot(ScreenshotArtifact::new(name, image_data)) {
                        return Err(violate(run, violation));
                    }
                }
                SuiteEvent::SuiteFinished => {
                    // Anything already queued behind the finish signal is a late event.
                    let mut queued = rx.try_iter();
                    if let Some(late) = queued.next() {
                        let dropped = queued.count();
                        if dropped > 0 {
                            debug!(dropped, "discarding further late events");
                        }
                        let violation = ProtocolViolation::EventAfterTerminal {
                            event: late.describe(),
                        };
                        return Err(violate(run, violation));
                    }
                    run.close(RunStatus::Finished);
                    return Ok(());
                }
                SuiteEvent::SuiteAborted { reason } => {
                    run.close(RunStatus::Aborted {
                        reason: reason.clone(),
                    });
                    return Err(RunnerError::SuiteAborted { reason });
                }
            }
        }
    }
}

fn violate<E>(run: &mut TestRun, violation: ProtocolViolation) -> RunnerError<E> {
    warn!(suite = %run.suite, %violation, "protocol violation");
    run.close(RunStatus::Violated {
        violation: violation.clone(),
    });
    RunnerError::ProtocolViolation(violation)
}
