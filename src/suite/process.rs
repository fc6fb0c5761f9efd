//! Suite hosted in a separate application process.
//!
//! The application writes one JSON object per line on stdout:
//!
//! ```text
//! {"event":"test_completed","name":"A","success":true}
//! {"event":"test_completed","name":"B","success":false,"failure_message":"assert X"}
//! {"event":"screenshot_captured","name":"shot1","png_base64":"iVBORw0KGgo..."}
//! {"event":"suite_finished"}
//! ```
//!
//! Lines that are not events (ordinary application output, including bytes
//! that are not valid UTF-8) are ignored, and stdout is read to the end so the
//! application never writes into a closed pipe while the run is live.
//! If stdout closes before `suite_finished` or `suite_aborted`, the run is
//! aborted with the process exit status as the reason. When the runner stops
//! a run early, the process is killed.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{EmbeddedSuite, EventError, EventSender, SuiteError, SuiteEvent, SuiteResult};

/// How often the output thread checks whether a process with closed stdout has exited
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration and launcher for a process-hosted suite
#[derive(Debug, Clone)]
pub struct ProcessSuite {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    running: Option<Arc<Mutex<Child>>>,
}

impl ProcessSuite {
    /// Create a suite for the given program, named after its file stem
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "process".to_string());
        Self {
            name,
            program,
            args: Vec::new(),
            envs: Vec::new(),
            running: None,
        }
    }

    /// Set arguments for the program
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable for the program
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Override the suite name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl EmbeddedSuite for ProcessSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, events: EventSender) -> SuiteResult<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                SuiteError::Setup(format!("failed to spawn '{}': {}", self.program.display(), e))
            })?;

        info!(program = %self.program.display(), pid = child.id(), "suite process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SuiteError::Io(std::io::Error::other("Failed to capture stdout")))?;

        let child = Arc::new(Mutex::new(child));
        self.running = Some(Arc::clone(&child));

        thread::Builder::new()
            .name(format!("suite-{}", self.name))
            .spawn(move || pump_events(BufReader::new(stdout), child, events))?;

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(child) = self.running.take() {
            kill(&child);
        }
    }
}

/// Forward events from the child's stdout until it closes
fn pump_events<R: BufRead>(mut reader: R, child: Arc<Mutex<Child>>, events: EventSender) {
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read suite output");
                break;
            }
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        let Some(event) = parse_event_line(line) else {
            debug!(%line, "suite output");
            continue;
        };

        match events.send(event) {
            Ok(()) => {}
            Err(EventError::RunClosed) => {
                warn!(%line, "suite process reported an event after the run ended");
            }
            Err(EventError::Disconnected) => {
                debug!("runner stopped listening, stopping suite process");
                kill(&child);
                break;
            }
        }
    }

    let status = wait_for_exit(&child);
    if !events.is_closed() {
        let reason = match status {
            Ok(status) => format!("process exited ({}) before the suite finished", status),
            Err(e) => format!("process output closed before the suite finished: {}", e),
        };
        let _ = events.abort(reason);
    }
}

/// Kill the process unless it already exited
fn kill(child: &Mutex<Child>) {
    let Ok(mut child) = child.lock() else {
        return;
    };
    if let Ok(None) = child.try_wait() {
        info!(pid = child.id(), "stopping suite process");
        if let Err(e) = child.kill() {
            warn!(pid = child.id(), error = %e, "failed to kill suite process");
        }
    }
}

/// Reap the process without holding the lock across the wait, so a
/// concurrent [`kill`] can still get in
fn wait_for_exit(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        let polled = child
            .lock()
            .map_err(|_| io::Error::other("process handle poisoned"))?
            .try_wait()?;
        if let Some(status) = polled {
            return Ok(status);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Parse one stdout line as an event, if it is one
pub fn parse_event_line(line: &str) -> Option<SuiteEvent> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
