//! Integration tests for the runner against scripted and closure suites

use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use integration_runner::{
    ClosureSuite, EmptyRunPolicy, ProtocolViolation, RunStatus, RunnerConfig, RunnerError,
    ScreenshotArtifact, ScriptedSuite, SuiteEvent, TestRunner,
};

fn fast_config() -> RunnerConfig {
    RunnerConfig::defaults().poll_interval(Duration::from_millis(5))
}

fn abc_events(shot: &ScreenshotArtifact) -> Vec<SuiteEvent> {
    vec![
        SuiteEvent::passed("A"),
        SuiteEvent::screenshot("shot1", shot.image_data.clone()),
        SuiteEvent::failed("B", "assert X"),
        SuiteEvent::passed("C"),
        SuiteEvent::SuiteFinished,
    ]
}

#[test]
fn test_abc_scenario() {
    let shot = ScreenshotArtifact::from_rgb("shot1", 2, 2, vec![7u8; 12]).expect("encode");
    let mut runner = TestRunner::with_config(ScriptedSuite::new("abc", abc_events(&shot)), fast_config());

    let mut calls = Vec::new();
    let run = runner
        .run_and_collect(|o| calls.push((o.name.clone(), o.success, o.failure_message.clone())))
        .expect("run should finish");
    assert!(run.is_complete());
    assert!(!run.all_passed(EmptyRunPolicy::Fail));

    assert_eq!(
        calls,
        vec![
            ("A".to_string(), true, None),
            ("B".to_string(), false, Some("assert X".to_string())),
            ("C".to_string(), true, None),
        ]
    );

    let screenshots = runner.captured_screenshots_by_name();
    assert_eq!(screenshots.keys().collect::<Vec<_>>(), vec!["shot1"]);
    assert_eq!(screenshots["shot1"].image_data, shot.image_data);
    assert_eq!(screenshots["shot1"].dimensions(), Some((2, 2)));
}

#[test]
#[allow(deprecated)]
fn test_abc_scenario_legacy_summary() {
    let shot = ScreenshotArtifact::new("shot1", vec![1, 2, 3]);
    let mut runner = TestRunner::with_config(ScriptedSuite::new("abc", abc_events(&shot)), fast_config());

    let (all_passed, summary) =
        integration_runner::LegacyResultAdapter::new(&mut runner).run_and_summarize();
    assert!(!all_passed);
    let summary = summary.expect("summary on failure");
    assert!(summary.contains('B'));
    assert!(summary.contains("assert X"));
    assert!(!summary.contains("A:"));
}

#[test]
fn test_many_tests_keep_order() {
    let mut events: Vec<_> = (0..500).map(|i| SuiteEvent::passed(format!("test_{}", i))).collect();
    events.push(SuiteEvent::SuiteFinished);
    let mut runner = TestRunner::with_config(ScriptedSuite::new("many", events), fast_config());

    let mut seen = Vec::new();
    let run = runner.run_and_collect(|o| seen.push(o.name.clone())).unwrap();
    assert_eq!(run.outcomes.len(), 500);
    assert!(run.all_passed(EmptyRunPolicy::Fail));
    let expected: Vec<_> = (0..500).map(|i| format!("test_{}", i)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_screenshot_overwrite_keeps_latest() {
    let events = vec![
        SuiteEvent::screenshot("login", vec![1]),
        SuiteEvent::passed("A"),
        SuiteEvent::screenshot("login", vec![2, 2]),
        SuiteEvent::SuiteFinished,
    ];
    let mut runner = TestRunner::with_config(ScriptedSuite::new("shots", events), fast_config());
    runner.run_and_collect(|_| {}).unwrap();

    let screenshots = runner.captured_screenshots_by_name();
    assert_eq!(screenshots.len(), 1);
    assert_eq!(screenshots["login"].image_data, vec![2, 2]);
}

#[test]
fn test_duplicate_name_is_protocol_violation() {
    let events = vec![
        SuiteEvent::passed("A"),
        SuiteEvent::failed("A", "stale"),
        SuiteEvent::SuiteFinished,
    ];
    let mut runner = TestRunner::with_config(ScriptedSuite::new("dup", events), fast_config());

    let mut calls = Vec::new();
    let err = runner.run_and_collect(|o| calls.push(o.clone())).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::ProtocolViolation(ProtocolViolation::DuplicateTest { .. })
    ));
    assert_eq!(calls.len(), 1);
    assert!(calls[0].success);
}

#[test]
fn test_closure_suite_end_to_end() {
    let suite = ClosureSuite::new("closures")
        .test("renders", |ctx| {
            let shot = ScreenshotArtifact::from_rgb("home", 1, 1, vec![0, 0, 0]).map_err(|e| e.to_string())?;
            ctx.take_screenshot(shot.name, shot.image_data).map_err(|e| e.to_string())
        })
        .test("asserts", |ctx| Err(format!("{} saw wrong title", ctx.test_name())))
        .test("panics", |_| {
            let items: Vec<u32> = Vec::new();
            if items.is_empty() {
                panic!("no items");
            }
            Ok(())
        });

    let mut runner = TestRunner::with_config(suite, fast_config());
    let run = runner.run_and_collect(|_| {}).unwrap();

    assert_eq!(run.passed_count(), 1);
    assert_eq!(run.failed_count(), 2);
    assert_eq!(run.outcomes[1].failure_message.as_deref(), Some("asserts saw wrong title"));
    assert_eq!(run.outcomes[2].failure_message.as_deref(), Some("panicked: no items"));
    assert!(runner.captured_screenshots_by_name().contains_key("home"));
}

#[test]
fn test_cancel_in_flight_run() {
    let suite = ClosureSuite::new("stuck")
        .test("first", |_| Ok(()))
        .test("hangs", |_| {
            thread::sleep(Duration::from_secs(5));
            Ok(())
        });
    let mut runner = TestRunner::with_config(suite, fast_config());
    let handle = runner.cancel_handle();

    let (first_seen, wait_first) = mpsc::channel();
    let canceller = thread::spawn(move || {
        wait_first.recv().unwrap();
        handle.cancel();
    });

    let mut seen = Vec::new();
    let err = runner
        .run_and_collect(|o| {
            seen.push(o.name.clone());
            let _ = first_seen.send(());
        })
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, RunnerError::Cancelled));
    assert_eq!(seen, vec!["first"]);
    let run = runner.last_run().unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.is_partial());
}

#[test]
fn test_runner_can_run_twice() {
    let events = vec![SuiteEvent::passed("A"), SuiteEvent::SuiteFinished];
    let mut runner = TestRunner::with_config(ScriptedSuite::new("again", events), fast_config());

    for _ in 0..2 {
        let run = runner.run_and_collect(|_| {}).unwrap();
        assert_eq!(run.outcomes.len(), 1);
    }
}

#[test]
fn test_empty_run_policy() {
    let mut runner = TestRunner::with_config(
        ScriptedSuite::new("empty", vec![SuiteEvent::SuiteFinished]),
        fast_config().empty_run_policy(EmptyRunPolicy::Pass),
    );
    let run = runner.run_and_collect(|_| {}).unwrap();
    assert!(run.outcomes.is_empty());
    assert!(run.all_passed(EmptyRunPolicy::Pass));
    assert!(!run.all_passed(EmptyRunPolicy::Fail));
}
