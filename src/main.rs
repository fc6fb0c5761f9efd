use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use integration_runner::config;
use integration_runner::report::{ReportDir, write_report};
use integration_runner::{
    EmbeddedSuite, ProcessSuite, ScreenshotArtifact, ScriptedSuite, SuiteEvent, TestOutcome, TestRun,
    TestRunner,
};

/// Integration Runner - run an embedded test suite and report per-test results
#[derive(Parser, Debug)]
#[command(
    name = "integration-runner",
    about = "Run an in-app integration test suite and collect results and screenshots",
    after_help = "ENVIRONMENT VARIABLES:\n\
        INTEGRATION_RUNNER_REPORT_DIR   Base directory for reports\n\
        INTEGRATION_RUNNER_POLL_MS      Cancellation poll interval (ms)\n\
        INTEGRATION_RUNNER_EMPTY_RUN    Verdict for zero-test runs (pass|fail)\n\
        INTEGRATION_RUNNER_LOG          Log filter (falls back to RUST_LOG)"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch an application that reports JSON-line events on stdout
    Exec {
        /// Write report.json and screenshots to this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a report under the configured report directory
        #[arg(long)]
        report: bool,

        /// Print the run as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Print only a single verdict and failure summary
        #[arg(long)]
        legacy: bool,

        /// Application to launch
        program: PathBuf,

        /// Arguments to pass to the application
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Replay a built-in scripted suite (tests A, B, C and one screenshot)
    Demo {
        /// Comma-separated test names, reported in this order
        #[arg(short, long, value_delimiter = ',', default_value = "A,B,C")]
        tests: Vec<String>,

        /// Failing tests as NAME:MESSAGE (repeatable)
        #[arg(short, long, default_value = "B:assert X")]
        fail: Vec<String>,

        /// Delay in milliseconds between events
        #[arg(short, long, default_value = "0")]
        delay: u64,

        /// Write report.json and screenshots to this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Print only a single verdict and failure summary
        #[arg(long)]
        legacy: bool,
    },
}

/// How results are printed and stored
struct OutputOptions {
    output: Option<PathBuf>,
    report: bool,
    json: bool,
    legacy: bool,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    integration_runner::logging::init();
    let args = Args::parse();

    match args.command {
        Commands::Exec {
            output,
            report,
            json,
            legacy,
            program,
            args: program_args,
        } => {
            let suite = ProcessSuite::new(program).args(program_args);
            run_suite(suite, OutputOptions { output, report, json, legacy })
        }

        Commands::Demo {
            tests,
            fail,
            delay,
            output,
            json,
            legacy,
        } => {
            let suite = demo_suite(&tests, &fail)?.delay(Duration::from_millis(delay));
            run_suite(
                suite,
                OutputOptions {
                    output,
                    report: false,
                    json,
                    legacy,
                },
            )
        }
    }
}

/// Build the scripted demo: each test in order, with a screenshot after the first
fn demo_suite(tests: &[String], failures: &[String]) -> Result<ScriptedSuite, Box<dyn Error>> {
    let mut messages = HashMap::new();
    for entry in failures {
        let (name, message) = entry
            .split_once(':')
            .ok_or_else(|| format!("Invalid --fail '{}'. Use NAME:MESSAGE", entry))?;
        messages.insert(name.trim().to_string(), message.trim().to_string());
    }

    let shot = ScreenshotArtifact::from_rgb("shot1", 64, 48, [30u8, 144, 255].repeat(64 * 48))?;

    let mut events = Vec::new();
    for (index, name) in tests.iter().enumerate() {
        events.push(match messages.get(name) {
            Some(message) => SuiteEvent::failed(name.clone(), message.clone()),
            None => SuiteEvent::passed(name.clone()),
        });
        if index == 0 {
            events.push(SuiteEvent::screenshot(shot.name.clone(), shot.image_data.clone()));
        }
    }
    events.push(SuiteEvent::SuiteFinished);

    Ok(ScriptedSuite::new("demo", events))
}

fn run_suite(
    suite: impl EmbeddedSuite + 'static,
    options: OutputOptions,
) -> Result<ExitCode, Box<dyn Error>> {
    let mut runner = TestRunner::new(suite);

    if options.legacy {
        #[allow(deprecated)]
        let (passed, summary) =
            integration_runner::LegacyResultAdapter::new(&mut runner).run_and_summarize();
        println!("{}", if passed { "PASSED" } else { "FAILED" });
        if let Some(summary) = summary {
            println!("{}", summary);
        }
        export(&runner, &options)?;
        return Ok(exit_code(passed));
    }

    let print_lines = !options.json;
    let result = runner.run_and_collect(|outcome| {
        if print_lines {
            print_outcome(outcome);
        }
    });
    let error = result.err().map(|e| e.to_string());

    let Some(run) = runner.last_run() else {
        return Err(error.unwrap_or_else(|| "run produced no result".to_string()).into());
    };
    let passed = run.all_passed(runner.config().empty_run_policy);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&json_summary(run, error.as_deref()))?);
    } else {
        println!();
        println!(
            "{} passed, {} failed, {} screenshot(s)",
            run.passed_count(),
            run.failed_count(),
            run.screenshots.len()
        );
        if let Some(error) = &error {
            println!("Run did not complete: {}", error);
        }
        println!("{}", if passed { "PASSED" } else { "FAILED" });
    }

    export(&runner, &options)?;
    Ok(exit_code(passed))
}

fn print_outcome(outcome: &TestOutcome) {
    match (outcome.success, &outcome.failure_message) {
        (true, _) => println!("PASS {}", outcome.name),
        (false, Some(message)) => println!("FAIL {}: {}", outcome.name, message),
        (false, None) => println!("FAIL {}", outcome.name),
    }
}

fn json_summary(run: &TestRun, error: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "suite": run.suite,
        "status": run.status,
        "partial": run.is_partial(),
        "error": error,
        "passed": run.passed_count(),
        "failed": run.failed_count(),
        "outcomes": run.outcomes,
        "screenshots": run.screenshots.keys().collect::<Vec<_>>(),
    })
}

fn export(runner: &TestRunner, options: &OutputOptions) -> Result<(), Box<dyn Error>> {
    let Some(run) = runner.last_run() else {
        return Ok(());
    };
    let target = match (&options.output, options.report) {
        (Some(dir), _) => ReportDir::in_dir(dir),
        (None, true) => ReportDir::under(config::report_base_dir(), &run.suite),
        (None, false) => return Ok(()),
    };
    let path = write_report(run, &target)?;
    eprintln!("Report: {}", path.display());
    Ok(())
}

fn exit_code(passed: bool) -> ExitCode {
    if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
