//! Export of a run to disk for a harness or CI job.
//!
//! Layout of a report directory:
//!
//! ```text
//! <base>/<suite>_<YYYYmmdd_HHMMSS>/
//!     report.json
//!     screenshots/<name>.png
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config;
use crate::runner::{RunStatus, TestOutcome, TestRun};

/// Report file name inside a report directory
pub const REPORT_FILE: &str = "report.json";

/// Screenshot subdirectory inside a report directory
pub const SCREENSHOT_DIR: &str = "screenshots";

/// A directory that receives one run's report
#[derive(Debug, Clone)]
pub struct ReportDir {
    /// Root directory for this report
    pub dir: PathBuf,
}

impl ReportDir {
    /// A fresh directory under the configured base, named after the suite
    pub fn for_suite(suite: &str) -> Self {
        Self::under(config::report_base_dir(), suite)
    }

    /// A fresh directory under `base`, named after the suite
    pub fn under(base: impl Into<PathBuf>, suite: &str) -> Self {
        let id = format!("{}_{}", sanitize_name(suite), generate_timestamp_suffix());
        Self {
            dir: base.into().join(id),
        }
    }

    /// Use exactly this directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of `report.json`
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    /// Path a screenshot is written to when no other artifact shares its sanitized name
    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshot_file(&sanitize_name(name))
    }

    fn screenshot_file(&self, stem: &str) -> PathBuf {
        self.dir.join(SCREENSHOT_DIR).join(format!("{}.png", stem))
    }
}

/// Serialized form of `report.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Suite name
    pub suite: String,
    /// Host the run executed on
    pub host: Option<String>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run ended
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal status
    pub status: RunStatus,
    /// True when the run ended before the suite finished
    pub partial: bool,
    /// Passing test count
    pub passed: usize,
    /// Failing test count
    pub failed: usize,
    /// Outcomes in completion order
    pub outcomes: Vec<TestOutcome>,
    /// Screenshot files, relative to the report directory
    pub screenshots: Vec<ScreenshotEntry>,
}

/// One exported screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotEntry {
    /// Artifact name
    pub name: String,
    /// File path relative to the report directory
    pub file: PathBuf,
    /// Size of the image data in bytes
    pub bytes: usize,
    /// Pixel dimensions when decodable
    pub dimensions: Option<(u32, u32)>,
}

/// Write `report.json` and every screenshot. Returns the report path.
pub fn write_report(run: &TestRun, target: &ReportDir) -> std::io::Result<PathBuf> {
    fs::create_dir_all(target.dir.join(SCREENSHOT_DIR))?;

    let mut screenshots = Vec::with_capacity(run.screenshots.len());
    let mut used = HashSet::new();
    for artifact in run.screenshots.values() {
        let path = target.screenshot_file(&unique_stem(&artifact.name, &mut used));
        fs::write(&path, &artifact.image_data)?;
        screenshots.push(ScreenshotEntry {
            name: artifact.name.clone(),
            file: relative_to(&path, &target.dir),
            bytes: artifact.image_data.len(),
            dimensions: artifact.dimensions(),
        });
    }

    let report = RunReport {
        suite: run.suite.clone(),
        host: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
        started_at: run.started_at,
        finished_at: run.finished_at,
        status: run.status.clone(),
        partial: run.is_partial(),
        passed: run.passed_count(),
        failed: run.failed_count(),
        outcomes: run.outcomes.clone(),
        screenshots,
    };

    let report_path = target.report_path();
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    tracing::info!(path = %report_path.display(), "report written");
    Ok(report_path)
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Sanitized file stem for `name`, suffixed `_2`, `_3`, ... if an earlier
/// artifact already claimed it
fn unique_stem(name: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_name(name);
    let mut stem = base.clone();
    let mut n = 1;
    while !used.insert(stem.clone()) {
        n += 1;
        stem = format!("{}_{}", base, n);
    }
    stem
}

/// Generate a timestamp suffix
fn generate_timestamp_suffix() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}
