//! The ordered event channel from a running suite to the runner.
//!
//! A run accepts exactly one terminal event. Once any clone of the sender has
//! delivered `SuiteFinished` or `SuiteAborted`, every later send on any clone
//! is refused with [`EventError::RunClosed`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

/// Something the embedded suite reports while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SuiteEvent {
    /// One test finished
    TestCompleted {
        name: String,
        success: bool,
        #[serde(default)]
        failure_message: Option<String>,
    },

    /// A test captured a named image
    ScreenshotCaptured {
        name: String,
        #[serde(rename = "png_base64", with = "crate::runner::types::base64_bytes")]
        image_data: Vec<u8>,
    },

    /// Every test has completed
    SuiteFinished,

    /// The suite cannot continue
    SuiteAborted { reason: String },
}

impl SuiteEvent {
    /// A passing completion
    pub fn passed(name: impl Into<String>) -> Self {
        SuiteEvent::TestCompleted {
            name: name.into(),
            success: true,
            failure_message: None,
        }
    }

    /// A failing completion
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        SuiteEvent::TestCompleted {
            name: name.into(),
            success: false,
            failure_message: Some(message.into()),
        }
    }

    /// A screenshot capture
    pub fn screenshot(name: impl Into<String>, image_data: Vec<u8>) -> Self {
        SuiteEvent::ScreenshotCaptured {
            name: name.into(),
            image_data,
        }
    }

    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, SuiteEvent::SuiteFinished | SuiteEvent::SuiteAborted { .. })
    }

    /// Short label for logs and protocol errors
    pub fn describe(&self) -> String {
        match self {
            SuiteEvent::TestCompleted { name, .. } => format!("test_completed({})", name),
            SuiteEvent::ScreenshotCaptured { name, .. } => format!("screenshot_captured({})", name),
            SuiteEvent::SuiteFinished => "suite_finished".to_string(),
            SuiteEvent::SuiteAborted { .. } => "suite_aborted".to_string(),
        }
    }
}

/// Result type for event delivery
pub type EventResult<T> = Result<T, EventError>;

/// Error types for event delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The runner is no longer listening (the run already ended)
    Disconnected,

    /// A terminal event was already sent for this run
    RunClosed,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Disconnected => write!(f, "runner is no longer receiving events"),
            EventError::RunClosed => write!(f, "run already finished or aborted"),
        }
    }
}

impl std::error::Error for EventError {}

/// Sending half of a run's event channel, handed to the suite when it starts.
///
/// Clones share the same channel and the same closed state, so a suite may
/// report from several threads; the runner sees events in the order the
/// sends happened.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SuiteEvent>,
    closed: Arc<AtomicBool>,
}

impl EventSender {
    /// Create a connected sender/receiver pair
    pub fn channel() -> (EventSender, mpsc::Receiver<SuiteEvent>) {
        let (tx, rx) = mpsc::channel();
        let sender = EventSender {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (sender, rx)
    }

    /// Deliver any event.
    ///
    /// Fails with [`EventError::RunClosed`] once a terminal event has gone out
    /// through this sender or any of its clones.
    pub fn send(&self, event: SuiteEvent) -> EventResult<()> {
        let already_closed = if event.is_terminal() {
            self.closed.swap(true, Ordering::AcqRel)
        } else {
            self.closed.load(Ordering::Acquire)
        };
        if already_closed {
            return Err(EventError::RunClosed);
        }
        self.tx.send(event).map_err(|_| EventError::Disconnected)
    }

    /// Whether a terminal event has been sent for this run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Report a finished test
    pub fn test_completed(
        &self,
        name: impl Into<String>,
        success: bool,
        failure_message: Option<String>,
    ) -> EventResult<()> {
        self.send(SuiteEvent::TestCompleted {
            name: name.into(),
            success,
            failure_message,
        })
    }

    /// Report a captured screenshot
    pub fn screenshot_captured(&self, name: impl Into<String>, image_data: Vec<u8>) -> EventResult<()> {
        self.send(SuiteEvent::screenshot(name, image_data))
    }

    /// Report that every test has completed
    pub fn finish(&self) -> EventResult<()> {
        self.send(SuiteEvent::SuiteFinished)
    }

    /// Report that the suite cannot continue
    pub fn abort(&self, reason: impl Into<String>) -> EventResult<()> {
        self.send(SuiteEvent::SuiteAborted { reason: reason.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_format() {
        let event: SuiteEvent =
            serde_json::from_str(r#"{"event":"test_completed","name":"A","success":true}"#).unwrap();
        assert_eq!(event, SuiteEvent::passed("A"));

        let event: SuiteEvent =
            serde_json::from_str(r#"{"event":"screenshot_captured","name":"shot1","png_base64":"AQID"}"#)
                .unwrap();
        assert_eq!(event, SuiteEvent::screenshot("shot1", vec![1, 2, 3]));

        let event: SuiteEvent = serde_json::from_str(r#"{"event":"suite_aborted","reason":"boom"}"#).unwrap();
        assert!(event.is_terminal());

        let json = serde_json::to_string(&SuiteEvent::SuiteFinished).unwrap();
        assert_eq!(json, r#"{"event":"suite_finished"}"#);
    }

    #[test]
    fn test_sender_preserves_order() {
        let (sender, rx) = EventSender::channel();
        sender.test_completed("A", true, None).unwrap();
        sender.screenshot_captured("s", vec![9]).unwrap();
        sender.finish().unwrap();

        let received: Vec<_> = rx.try_iter().map(|e| e.describe()).collect();
        assert_eq!(
            received,
            vec!["test_completed(A)", "screenshot_captured(s)", "suite_finished"]
        );
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sender, rx) = EventSender::channel();
        drop(rx);
        assert_eq!(sender.finish(), Err(EventError::Disconnected));
    }

    #[test]
    fn test_send_after_finish_is_refused() {
        let (sender, rx) = EventSender::channel();
        sender.finish().unwrap();
        assert!(sender.is_closed());

        assert_eq!(
            sender.test_completed("late", true, None),
            Err(EventError::RunClosed)
        );
        assert_eq!(sender.screenshot_captured("late", vec![1]), Err(EventError::RunClosed));
        assert_eq!(sender.finish(), Err(EventError::RunClosed));
        assert_eq!(sender.abort("too late"), Err(EventError::RunClosed));

        // The receiver is still alive; only the finish signal went through
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received, vec![SuiteEvent::SuiteFinished]);
    }

    #[test]
    fn test_clones_share_closed_state() {
        let (sender, rx) = EventSender::channel();
        let worker = sender.clone();

        worker.abort("worker gave up").unwrap();
        assert_eq!(sender.test_completed("A", true, None), Err(EventError::RunClosed));

        let late = sender.clone();
        assert_eq!(late.finish(), Err(EventError::RunClosed));
        assert_eq!(rx.try_iter().count(), 1);
    }
}
