//! In-process suite built from named Rust closures.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use super::{EmbeddedSuite, EventResult, EventSender, SuiteResult};

type TestFn = Arc<dyn Fn(&mut TestContext) -> Result<(), String> + Send + Sync>;
type SetUpFn = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Handle given to each test while it runs
pub struct TestContext {
    test_name: String,
    events: EventSender,
}

impl TestContext {
    /// Name of the test currently running
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Publish a named screenshot. A later capture with the same name replaces this one.
    pub fn take_screenshot(&self, name: impl Into<String>, image_data: Vec<u8>) -> EventResult<()> {
        self.events.screenshot_captured(name, image_data)
    }
}

/// Runs registered tests one after another on a worker thread.
///
/// A test fails when it returns `Err(message)` or panics; the panic payload
/// becomes the failure message. A failing `set_up` hook aborts the suite
/// before any test runs.
#[derive(Clone)]
pub struct ClosureSuite {
    name: String,
    set_up: Option<SetUpFn>,
    tests: Vec<(String, TestFn)>,
}

impl ClosureSuite {
    /// Create an empty suite
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            set_up: None,
            tests: Vec::new(),
        }
    }

    /// Run `hook` once before the first test
    pub fn set_up<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        self.set_up = Some(Arc::new(hook));
        self
    }

    /// Register a test
    pub fn test<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut TestContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.tests.push((name.into(), Arc::new(body)));
        self
    }

    /// Number of registered tests
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether no tests are registered
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl EmbeddedSuite for ClosureSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, events: EventSender) -> SuiteResult<()> {
        let set_up = self.set_up.clone();
        let tests = self.tests.clone();

        thread::Builder::new()
            .name(format!("suite-{}", self.name))
            .spawn(move || run_tests(set_up, tests, events))?;

        Ok(())
    }
}

fn run_tests(set_up: Option<SetUpFn>, tests: Vec<(String, TestFn)>, events: EventSender) {
    if let Some(hook) = set_up {
        let result = panic::catch_unwind(AssertUnwindSafe(|| hook()))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
        if let Err(reason) = result {
            warn!(%reason, "suite set-up failed");
            let _ = events.abort(format!("set-up failed: {}", reason));
            return;
        }
    }

    for (name, body) in tests {
        let mut ctx = TestContext {
            test_name: name.clone(),
            events: events.clone(),
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut ctx)))
            .unwrap_or_else(|payload| Err(format!("panicked: {}", panic_message(payload.as_ref()))));

        let delivered = match result {
            Ok(()) => events.test_completed(name, true, None),
            Err(message) => events.test_completed(name, false, Some(message)),
        };
        if delivered.is_err() {
            debug!("runner stopped listening, skipping remaining tests");
            return;
        }
    }

    let _ = events.finish();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
