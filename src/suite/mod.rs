//! Embedded suites: the code that actually runs tests and reports events.
//!
//! A suite is started by the runner with an [`EventSender`] and must return
//! promptly, delivering events from its own thread or process:
//! - [`ScriptedSuite`] replays a fixed event script
//! - [`ClosureSuite`] runs named Rust closures in-process
//! - [`ProcessSuite`] spawns an application that prints JSON-line events

pub mod closure;
pub mod events;
pub mod process;
pub mod scripted;

pub use closure::{ClosureSuite, TestContext};
pub use events::{EventError, EventResult, EventSender, SuiteEvent};
pub use process::ProcessSuite;
pub use scripted::ScriptedSuite;

/// Trait for suites the runner can drive
pub trait EmbeddedSuite: Send {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Begin executing. Events go through `events`; the last one must be
    /// `SuiteFinished` or `SuiteAborted`. Dropping every sender without
    /// either is treated as an abort.
    fn start(&mut self, events: EventSender) -> SuiteResult<()>;

    /// Called when the runner gives up on a run before the suite finished
    /// (cancellation, protocol violation, sink failure, abort). Suites that
    /// own external resources release them here. The default does nothing.
    fn stop(&mut self) {}
}

impl<S: EmbeddedSuite + ?Sized> EmbeddedSuite for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self, events: EventSender) -> SuiteResult<()> {
        (**self).start(events)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Result type for suite operations
pub type SuiteResult<T> = Result<T, SuiteError>;

/// Error types for starting a suite
#[derive(Debug)]
pub enum SuiteError {
    /// Error spawning a thread or process
    Io(std::io::Error),

    /// The suite rejected its own configuration
    Setup(String),
}

impl std::fmt::Display for SuiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteError::Io(err) => write!(f, "I/O error: {}", err),
            SuiteError::Setup(msg) => write!(f, "Setup error: {}", msg),
        }
    }
}

impl std::error::Error for SuiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SuiteError::Io(err) => Some(err),
            SuiteError::Setup(_) => None,
        }
    }
}

impl From<std::io::Error> for SuiteError {
    fn from(err: std::io::Error) -> Self {
        SuiteError::Io(err)
    }
}
