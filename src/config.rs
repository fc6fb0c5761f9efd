//! Configuration management with environment variable support.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `INTEGRATION_RUNNER_REPORT_DIR` | Base directory for exported reports | `/tmp/integration-runner` |
//! | `INTEGRATION_RUNNER_POLL_MS` | How often a blocked run checks for cancellation (ms) | `50` |
//! | `INTEGRATION_RUNNER_EMPTY_RUN` | Verdict for a run where no test completed (`pass` or `fail`) | `fail` |
//! | `INTEGRATION_RUNNER_LOG` | Log filter, falls back to `RUST_LOG` | `info` |
//!
//! # Example
//!
//! ```bash
//! export INTEGRATION_RUNNER_REPORT_DIR="/var/tmp/ci-reports"
//! export INTEGRATION_RUNNER_EMPTY_RUN="pass"
//! ```

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default base directory for exported reports
pub const DEFAULT_REPORT_DIR: &str = "/tmp/integration-runner";

/// Default cancellation poll interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default log filter
pub const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the report directory
pub const ENV_REPORT_DIR: &str = "INTEGRATION_RUNNER_REPORT_DIR";

/// Environment variable for the poll interval
pub const ENV_POLL_INTERVAL: &str = "INTEGRATION_RUNNER_POLL_MS";

/// Environment variable for the empty run policy
pub const ENV_EMPTY_RUN: &str = "INTEGRATION_RUNNER_EMPTY_RUN";

/// Environment variable for the log filter
pub const ENV_LOG: &str = "INTEGRATION_RUNNER_LOG";

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// How a run in which no test ever completed is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyRunPolicy {
    /// Zero tests is a failure (nothing was verified)
    #[default]
    Fail,
    /// Zero tests counts as a pass
    Pass,
}

impl EmptyRunPolicy {
    /// Parse `pass` / `fail` (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fail" | "failure" => Some(Self::Fail),
            "pass" | "success" => Some(Self::Pass),
            _ => None,
        }
    }
}

/// Centralized configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Runner configuration
    pub runner: RunnerConfig,
    /// Report configuration
    pub report: ReportSettings,
    /// Log filter directive
    pub log_filter: String,
}

/// Settings that shape a single run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between cancellation checks while blocked
    pub poll_interval: Duration,
    /// Verdict for zero-test runs
    pub empty_run_policy: EmptyRunPolicy,
}

/// Report export settings
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Base directory for run reports
    pub base_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            runner: RunnerConfig::from_env(),
            report: ReportSettings::from_env(),
            log_filter: env::var(ENV_LOG)
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            runner: RunnerConfig::defaults(),
            report: ReportSettings::defaults(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RunnerConfig {
    /// Create runner settings from environment variables
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                env::var(ENV_POLL_INTERVAL)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            empty_run_policy: env::var(ENV_EMPTY_RUN)
                .ok()
                .and_then(|s| EmptyRunPolicy::parse(&s))
                .unwrap_or_default(),
        }
    }

    /// Create runner settings with defaults
    pub fn defaults() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            empty_run_policy: EmptyRunPolicy::Fail,
        }
    }

    /// Override the empty run policy
    pub fn empty_run_policy(mut self, policy: EmptyRunPolicy) -> Self {
        self.empty_run_policy = policy;
        self
    }

    /// Override the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        get().runner.clone()
    }
}

impl ReportSettings {
    /// Create report settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_REPORT_DIR).unwrap_or_else(|_| DEFAULT_REPORT_DIR.to_string()),
        }
    }

    /// Create report settings with defaults
    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_REPORT_DIR.to_string(),
        }
    }
}

/// Get report base directory (convenience function)
pub fn report_base_dir() -> String {
    get().report.base_dir.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_run_policy_parse() {
        assert_eq!(EmptyRunPolicy::parse("fail"), Some(EmptyRunPolicy::Fail));
        assert_eq!(EmptyRunPolicy::parse(" PASS "), Some(EmptyRunPolicy::Pass));
        assert_eq!(EmptyRunPolicy::parse("maybe"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.report.base_dir, DEFAULT_REPORT_DIR);
        assert_eq!(config.runner.poll_interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert_eq!(config.runner.empty_run_policy, EmptyRunPolicy::Fail);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_runner_config_builders() {
        let config = RunnerConfig::defaults()
            .empty_run_policy(EmptyRunPolicy::Pass)
            .poll_interval(Duration::from_millis(5));
        assert_eq!(config.empty_run_policy, EmptyRunPolicy::Pass);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }
}
