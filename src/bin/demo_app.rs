//! # Demo Application
//!
//! A stand-in for an application with an embedded test suite. It runs three
//! fake tests and reports them as JSON lines on stdout, the protocol
//! `integration-runner exec` and `ProcessSuite` understand:
//!
//! - `A` passes and captures screenshot `shot1`
//! - `B` fails with `assert X`
//! - `C` passes
//!
//! Flags bend the protocol for testing the runner's error paths.

use clap::Parser;
use std::error::Error;
use std::io::{Write, stdout};
use std::thread;
use std::time::Duration;

use integration_runner::{ScreenshotArtifact, SuiteEvent};

#[derive(Parser, Debug)]
#[command(name = "demo_app", about = "Fake application that reports integration test events")]
struct Args {
    /// Exit with status 1 after test B instead of finishing
    #[arg(long)]
    crash: bool,

    /// Report test A twice
    #[arg(long)]
    duplicate: bool,

    /// Delay in milliseconds between tests
    #[arg(long, default_value = "0")]
    delay: u64,
}

fn emit(out: &mut impl Write, event: &SuiteEvent) -> Result<(), Box<dyn Error>> {
    writeln!(out, "{}", serde_json::to_string(event)?)?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let mut out = stdout().lock();
    let pause = || thread::sleep(Duration::from_millis(args.delay));

    // Ordinary application output is interleaved with events
    writeln!(out, "demo_app starting")?;

    let shot = ScreenshotArtifact::from_rgb("shot1", 8, 8, [255u8, 0, 0].repeat(64))?;
    emit(&mut out, &SuiteEvent::screenshot(shot.name, shot.image_data))?;
    emit(&mut out, &SuiteEvent::passed("A"))?;
    if args.duplicate {
        emit(&mut out, &SuiteEvent::failed("A", "stale result"))?;
    }
    pause();

    emit(&mut out, &SuiteEvent::failed("B", "assert X"))?;
    pause();

    if args.crash {
        std::process::exit(1);
    }

    emit(&mut out, &SuiteEvent::passed("C"))?;
    emit(&mut out, &SuiteEvent::SuiteFinished)?;
    Ok(())
}
