pub mod orchestrator;
pub mod legacy;
pub mod types;

pub use orchestrator::{CancelHandle, TestRunner};
#[allow(deprecated)]
pub use legacy::LegacyResultAdapter;
pub use types::{
    ProtocolViolation, RunStatus, RunnerError, RunnerResult, ScreenshotArtifact, TestOutcome, TestRun,
};
