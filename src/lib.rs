//! Integration Runner - in-process test orchestration with ordered result reporting.
//!
//! This crate provides:
//! - A blocking [`TestRunner`] that starts an embedded suite and streams each
//!   completed test to a caller-supplied sink in arrival order
//! - Collection of named screenshots produced while the suite runs
//! - Explicit abort, protocol-violation, and cancellation outcomes
//! - Suites backed by event scripts, Rust closures, or an application process
//! - JSON report export for CI harnesses
//!
//! # Example
//!
//! ```rust,no_run
//! use integration_runner::{ClosureSuite, TestRunner};
//!
//! let suite = ClosureSuite::new("smoke")
//!     .test("opens", |_| Ok(()))
//!     .test("saves", |_| Err("save button missing".to_string()));
//!
//! let mut runner = TestRunner::new(suite);
//! let run = runner
//!     .run_and_collect(|outcome| println!("{} {}", outcome.name, outcome.success))
//!     .unwrap();
//! assert_eq!(run.failed_count(), 1);
//! ```

pub mod config;
pub mod logging;
pub mod report;
pub mod runner;
pub mod suite;

// Re-export runner types
#[allow(deprecated)]
pub use runner::LegacyResultAdapter;
pub use runner::{
    CancelHandle, ProtocolViolation, RunStatus, RunnerError, RunnerResult, ScreenshotArtifact,
    TestOutcome, TestRun, TestRunner,
};

// Re-export suites
pub use suite::{
    ClosureSuite, EmbeddedSuite, EventError, EventSender, ProcessSuite, ScriptedSuite, SuiteError,
    SuiteEvent, TestContext,
};

// Re-export configuration and reports
pub use config::{EmptyRunPolicy, RunnerConfig};
pub use report::{ReportDir, RunReport, write_report};
