//! Single-verdict facade kept for callers that predate per-test results.

#![allow(deprecated)]

use super::orchestrator::TestRunner;

/// Folds a whole run into one pass/fail flag and a text summary.
///
/// New integrations should call [`TestRunner::run_and_collect`] and inspect
/// each outcome instead.
#[deprecated(note = "Use TestRunner instead")]
pub struct LegacyResultAdapter<'a> {
    runner: &'a mut TestRunner,
}

impl<'a> LegacyResultAdapter<'a> {
    /// Wrap a runner
    pub fn new(runner: &'a mut TestRunner) -> Self {
        Self { runner }
    }

    /// Run the suite and return `(all_passed, summary)`.
    ///
    /// `summary` is `None` on success. Otherwise it has one `name: message`
    /// line per failing test, followed by the reason the run ended early (if
    /// it did) or a note that no tests ran.
    pub fn run_and_summarize(&mut self) -> (bool, Option<String>) {
        let policy = self.runner.config().empty_run_policy;
        let mut lines = Vec::new();

        let result = self.runner.run_and_collect(|outcome| {
            if !outcome.success {
                lines.push(format!(
                    "{}: {}",
                    outcome.name,
                    outcome.failure_message.as_deref().unwrap_or("(no message)")
                ));
            }
        });

        let all_passed = match &result {
            Ok(run) => {
                let passed = run.all_passed(policy);
                if !passed && run.outcomes.is_empty() {
                    lines.push("no tests ran".to_string());
                }
                passed
            }
            Err(err) => {
                lines.push(err.to_string());
                false
            }
        };

        if all_passed {
            (true, None)
        } else {
            (false, Some(lines.join("\n")))
        }
    }
}
