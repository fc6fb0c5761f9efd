//! Suite that replays a fixed list of events.

use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{EmbeddedSuite, EventSender, SuiteEvent, SuiteResult};

/// A suite that replays a fixed list of events from its own thread.
///
/// Useful for demos, benchmarks, and for exercising the runner against
/// well-formed and malformed event streams. Every `start` replays the
/// whole script again.
#[derive(Debug, Clone)]
pub struct ScriptedSuite {
    name: String,
    events: Vec<SuiteEvent>,
    delay: Duration,
}

impl ScriptedSuite {
    /// Create a suite that replays `events` as fast as possible
    pub fn new(name: impl Into<String>, events: Vec<SuiteEvent>) -> Self {
        Self {
            name: name.into(),
            events,
            delay: Duration::ZERO,
        }
    }

    /// Sleep between events
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The scripted events
    pub fn events(&self) -> &[SuiteEvent] {
        &self.events
    }
}

impl EmbeddedSuite for ScriptedSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, events: EventSender) -> SuiteResult<()> {
        let script = self.events.clone();
        let delay = self.delay;

        thread::Builder::new()
            .name(format!("suite-{}", self.name))
            .spawn(move || {
                for event in script {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    if events.send(event).is_err() {
                        debug!("runner stopped listening, ending script early");
                        break;
                    }
                }
            })?;

        Ok(())
    }
}
