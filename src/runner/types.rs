//! Types for test run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::convert::Infallible;
use std::io::Cursor;

use crate::config::EmptyRunPolicy;
use crate::suite::SuiteError;

/// Result of a single named test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Test name, unique within a run
    pub name: String,

    /// Whether the test passed
    pub success: bool,

    /// Failure description (always `None` for passing tests)
    pub failure_message: Option<String>,

    /// When the runner received the completion
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
}

impl TestOutcome {
    /// Create an outcome, dropping any failure message attached to a pass
    pub fn new(name: impl Into<String>, success: bool, failure_message: Option<String>) -> Self {
        Self {
            name: name.into(),
            success,
            failure_message: if success { None } else { failure_message },
            completed_at: Utc::now(),
        }
    }

    /// A passing outcome
    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, true, None)
    }

    /// A failing outcome with a message
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, false, Some(message.into()))
    }
}

/// A named image captured while the suite ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    /// Artifact key
    pub name: String,

    /// Image bytes exactly as the suite produced them (normally PNG)
    #[serde(with = "base64_bytes")]
    pub image_data: Vec<u8>,

    /// When the runner received the capture
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl ScreenshotArtifact {
    /// Wrap already-encoded image bytes
    pub fn new(name: impl Into<String>, image_data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            image_data,
            captured_at: Utc::now(),
        }
    }

    /// Encode a raw RGB buffer (row-major, 3 bytes per pixel) as PNG
    pub fn from_rgb(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, image::ImageError> {
        let img = image::RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(Self::new(name, bytes))
    }

    /// Pixel dimensions, if the bytes are an image format we can decode
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        image::load_from_memory(&self.image_data)
            .ok()
            .map(|img| (img.width(), img.height()))
    }
}

/// Where a run ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Events are still arriving
    Running,
    /// The suite reported that every test completed
    Finished,
    /// The suite stopped before finishing
    Aborted { reason: String },
    /// The suite broke the event protocol
    Violated { violation: ProtocolViolation },
    /// The caller cancelled the run
    Cancelled,
    /// The caller's result sink returned an error
    SinkFailed,
}

impl RunStatus {
    /// Whether no more events will be accepted
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Aggregate state of one suite execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Name of the suite that produced the run
    pub suite: String,

    /// When the run started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal status
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Current status
    pub status: RunStatus,

    /// Outcomes in completion order
    pub outcomes: Vec<TestOutcome>,

    /// Screenshots by name (last write wins)
    pub screenshots: BTreeMap<String, ScreenshotArtifact>,

    #[serde(skip)]
    seen_names: HashSet<String>,
}

impl TestRun {
    /// Start a new, empty run
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            outcomes: Vec::new(),
            screenshots: BTreeMap::new(),
            seen_names: HashSet::new(),
        }
    }

    /// Append an outcome, rejecting empty or repeated names and terminal runs
    pub fn record_outcome(&mut self, outcome: TestOutcome) -> Result<(), ProtocolViolation> {
        if self.status.is_terminal() {
            return Err(ProtocolViolation::EventAfterTerminal {
                event: format!("test_completed({})", outcome.name),
            });
        }
        if outcome.name.is_empty() {
            return Err(ProtocolViolation::EmptyTestName);
        }
        if !self.seen_names.insert(outcome.name.clone()) {
            return Err(ProtocolViolation::DuplicateTest { name: outcome.name });
        }
        self.outcomes.push(outcome);
        Ok(())
    }

    /// Store a screenshot, replacing any earlier one with the same name
    pub fn record_screenshot(&mut self, artifact: ScreenshotArtifact) -> Result<(), ProtocolViolation> {
        if self.status.is_terminal() {
            return Err(ProtocolViolation::EventAfterTerminal {
                event: format!("screenshot_captured({})", artifact.name),
            });
        }
        self.screenshots.insert(artifact.name.clone(), artifact);
        Ok(())
    }

    /// Move the run into a terminal status. The first terminal status sticks.
    pub fn close(&mut self, status: RunStatus) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Whether the suite reported completion
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Finished
    }

    /// Whether the outcomes are only what arrived before the run ended early
    pub fn is_partial(&self) -> bool {
        self.status.is_terminal() && !self.is_complete()
    }

    /// Number of passing tests
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failing tests
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Failing outcomes in completion order
    pub fn failures(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Complete, no failures, and at least one test unless the policy allows empty runs
    pub fn all_passed(&self, policy: EmptyRunPolicy) -> bool {
        if !self.is_complete() || self.failed_count() > 0 {
            return false;
        }
        !self.outcomes.is_empty() || policy == EmptyRunPolicy::Pass
    }
}

/// A breach of the suite event protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolViolation {
    /// A second completion arrived for a name already reported
    DuplicateTest { name: String },
    /// An event arrived after the suite finished or aborted
    EventAfterTerminal { event: String },
    /// A completion arrived without a test name
    EmptyTestName,
}

impl std::fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolViolation::DuplicateTest { name } => {
                write!(f, "test '{}' reported more than once", name)
            }
            ProtocolViolation::EventAfterTerminal { event } => {
                write!(f, "event {} received after the suite ended", event)
            }
            ProtocolViolation::EmptyTestName => write!(f, "test completed without a name"),
        }
    }
}

/// Result type for runner operations
pub type RunnerResult<T, E = Infallible> = Result<T, RunnerError<E>>;

/// Error types for a blocking run. `E` is the caller's sink error.
#[derive(Debug)]
pub enum RunnerError<E = Infallible> {
    /// The suite could not be started
    SuiteStart(SuiteError),

    /// The suite ended without reporting completion
    SuiteAborted { reason: String },

    /// The suite broke the event protocol
    ProtocolViolation(ProtocolViolation),

    /// The run was cancelled through a `CancelHandle`
    Cancelled,

    /// The caller's sink failed; returned untouched
    Sink(E),
}

impl<E: std::fmt::Display> std::fmt::Display for RunnerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::SuiteStart(err) => write!(f, "Suite failed to start: {}", err),
            RunnerError::SuiteAborted { reason } => write!(f, "Suite aborted: {}", reason),
            RunnerError::ProtocolViolation(v) => write!(f, "Protocol violation: {}", v),
            RunnerError::Cancelled => write!(f, "Run cancelled"),
            RunnerError::Sink(err) => write!(f, "Result sink failed: {}", err),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RunnerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::SuiteStart(err) => Some(err),
            RunnerError::Sink(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> From<SuiteError> for RunnerError<E> {
    fn from(err: SuiteError) -> Self {
        RunnerError::SuiteStart(err)
    }
}

impl<E> From<ProtocolViolation> for RunnerError<E> {
    fn from(v: ProtocolViolation) -> Self {
        RunnerError::ProtocolViolation(v)
    }
}

/// Serde helper storing byte buffers as standard base64 strings
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outcome_drops_message_on_pass() {
        let outcome = TestOutcome::new("A", true, Some("ignored".to_string()));
        assert_eq!(outcome.failure_message, None);

        let outcome = TestOutcome::failed("B", "assert X");
        assert_eq!(outcome.failure_message.as_deref(), Some("assert X"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut run = TestRun::new("suite");
        run.record_outcome(TestOutcome::passed("A")).unwrap();
        let err = run.record_outcome(TestOutcome::failed("A", "stale")).unwrap_err();
        assert_eq!(err, ProtocolViolation::DuplicateTest { name: "A".to_string() });
        assert_eq!(run.outcomes.len(), 1);
        assert!(run.outcomes[0].success);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut run = TestRun::new("suite");
        assert_eq!(
            run.record_outcome(TestOutcome::passed("")).unwrap_err(),
            ProtocolViolation::EmptyTestName
        );
    }

    #[test]
    fn test_screenshot_last_write_wins() {
        let mut run = TestRun::new("suite");
        run.record_screenshot(ScreenshotArtifact::new("shot", vec![1, 2, 3])).unwrap();
        run.record_screenshot(ScreenshotArtifact::new("shot", vec![4, 5])).unwrap();
        assert_eq!(run.screenshots.len(), 1);
        assert_eq!(run.screenshots["shot"].image_data, vec![4, 5]);
    }

    #[test]
    fn test_terminal_run_rejects_events() {
        let mut run = TestRun::new("suite");
        run.close(RunStatus::Finished);
        assert!(matches!(
            run.record_outcome(TestOutcome::passed("late")),
            Err(ProtocolViolation::EventAfterTerminal { .. })
        ));
        assert!(run.record_screenshot(ScreenshotArtifact::new("s", vec![])).is_err());
    }

    #[test]
    fn test_first_terminal_status_sticks() {
        let mut run = TestRun::new("suite");
        run.close(RunStatus::Aborted { reason: "crash".to_string() });
        run.close(RunStatus::Finished);
        assert!(run.is_partial());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_all_passed_policy() {
        let mut empty = TestRun::new("suite");
        empty.close(RunStatus::Finished);
        assert!(!empty.all_passed(EmptyRunPolicy::Fail));
        assert!(empty.all_passed(EmptyRunPolicy::Pass));

        let mut run = TestRun::new("suite");
        run.record_outcome(TestOutcome::passed("A")).unwrap();
        assert!(!run.all_passed(EmptyRunPolicy::Fail), "running is not passed");
        run.close(RunStatus::Finished);
        assert!(run.all_passed(EmptyRunPolicy::Fail));
    }

    #[test]
    fn test_from_rgb_encodes_png() {
        let artifact = ScreenshotArtifact::from_rgb("red", 4, 2, vec![255, 0, 0].repeat(8)).unwrap();
        assert_eq!(&artifact.image_data[1..4], b"PNG");
        assert_eq!(artifact.dimensions(), Some((4, 2)));

        assert!(ScreenshotArtifact::from_rgb("bad", 4, 2, vec![0; 5]).is_err());
    }

    #[test]
    fn test_artifact_json_uses_base64() {
        let artifact = ScreenshotArtifact::new("shot1", vec![0, 255, 7]);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["image_data"], "AP8H");

        let back: ScreenshotArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back.image_data, vec![0, 255, 7]);
    }
}
