//! Integration tests for Evbench
//!
//! These tests drive the event suite end to end through the public API.

use evbench::{
    BenchCase, BenchError, BenchRegistry, BenchmarkDriver, CancellationController,
    CollectingReporter, DriverConfig, EvbenchConfig, EventBench, JsonReport, JsonReporter,
    MeasureUnit, Phase, REPEAT_COUNT, SuiteParams, registry,
};
use std::time::Duration;

fn params(burst: u32) -> SuiteParams {
    SuiteParams::new(burst, &EvbenchConfig::default().pool)
}

fn config(rounds: u32, burst: u32) -> DriverConfig {
    DriverConfig {
        unit: MeasureUnit::Time,
        rounds,
        burst_size: burst,
        single_case: None,
    }
}

/// Full suite, both passes, every case reported once in registry order
#[test]
fn test_full_suite_reports_every_case() {
    let registry = registry();
    let driver =
        BenchmarkDriver::new(&registry, config(2, 4), CancellationController::new()).unwrap();
    let mut env = EventBench::new(params(4));
    let mut reporter = CollectingReporter::default();

    let summary = driver.execute(&mut env, &mut reporter).unwrap();

    assert_eq!(summary.state, Phase::Done);
    assert!(!summary.interrupted);
    assert_eq!(summary.reported, registry.len());
    // Two passes of two rounds per case
    assert_eq!(summary.executions, 2 * 2 * registry.len() as u64);

    assert_eq!(reporter.unit, Some(MeasureUnit::Time));
    assert!(reporter.finished);
    assert_eq!(reporter.results.len(), registry.len());
    for (i, (result, case)) in reporter.results.iter().zip(registry.iter()).enumerate() {
        assert_eq!(result.index, i + 1);
        assert_eq!(result.name, registry.report_name(case));
        assert_eq!(result.rounds, 2);
        assert!(result.average >= 0.0);
    }

    // Teardown deleted everything setup created.
    assert_eq!(env.machine().pool_count(), 0);
    assert_eq!(env.live_events(), 0);
}

/// Burst size 1 still sizes pools for the clone and ref cases
#[test]
fn test_minimum_burst_runs_clean() {
    let registry = registry();
    let driver =
        BenchmarkDriver::new(&registry, config(1, 1), CancellationController::new()).unwrap();
    let mut env = EventBench::new(params(1));
    let mut reporter = CollectingReporter::default();

    let summary = driver.execute(&mut env, &mut reporter).unwrap();
    assert_eq!(summary.state, Phase::Done);
    assert_eq!(reporter.results.len(), registry.len());
}

/// JSON output of a real run parses back into the report schema
#[test]
fn test_json_report_end_to_end() {
    let registry = registry();
    let driver =
        BenchmarkDriver::new(&registry, config(1, 2), CancellationController::new()).unwrap();
    let mut env = EventBench::new(params(2));
    let mut reporter = JsonReporter::new(Vec::new());

    driver.execute(&mut env, &mut reporter).unwrap();

    let report: JsonReport = serde_json::from_slice(&reporter.into_inner()).unwrap();
    assert_eq!(report.unit, MeasureUnit::Time);
    assert_eq!(report.repeat_count, REPEAT_COUNT as u32);
    assert_eq!(report.results.len(), registry.len());
    assert_eq!(report.results[0].name, "em_event_alloc(sw)");
}

/// Cancellation requested up front: nothing is measured, teardown still runs
#[test]
fn test_cancel_before_start() {
    let registry = registry();
    let cancel = CancellationController::new();
    cancel.request();
    let driver = BenchmarkDriver::new(&registry, config(1000, 8), cancel).unwrap();
    let mut env = EventBench::new(params(8));
    let mut reporter = CollectingReporter::default();

    let summary = driver.execute(&mut env, &mut reporter).unwrap();
    assert_eq!(summary.state, Phase::Done);
    assert!(summary.interrupted);
    assert_eq!(summary.executions, 0);
    assert!(reporter.results.is_empty());
    assert_eq!(env.machine().pool_count(), 0);
}

/// Single-case mode loops until another thread requests cancellation
#[test]
fn test_indefinite_case_until_cancelled() {
    let registry = registry();
    let cancel = CancellationController::new();
    let mut cfg = config(1000, 8);
    cfg.single_case = Some(registry.len()); // core_count
    let driver = BenchmarkDriver::new(&registry, cfg, cancel.clone()).unwrap();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        cancel.request();
    });

    let mut env = EventBench::new(params(8));
    let mut reporter = CollectingReporter::default();
    let summary = driver.execute(&mut env, &mut reporter).unwrap();
    canceller.join().unwrap();

    assert_eq!(summary.state, Phase::Cancelled);
    assert!(summary.executions > 0);
    assert!(reporter.results.is_empty());
    assert_eq!(env.machine().pool_count(), 0);
}

fn failing(_: &mut EventBench) -> i64 {
    0
}

fn passing(_: &mut EventBench) -> i64 {
    REPEAT_COUNT as i64
}

/// A failing case aborts the run; earlier lines stand and teardown runs
#[test]
fn test_failure_is_fatal_and_tears_down() {
    let registry = BenchRegistry::new(
        vec![
            BenchCase::new("ok", passing),
            BenchCase::new("broken", failing),
            BenchCase::new("never", passing),
        ],
        REPEAT_COUNT as u32,
    )
    .with_name_prefix("em_");
    let driver =
        BenchmarkDriver::new(&registry, config(3, 8), CancellationController::new()).unwrap();
    let mut env = EventBench::new(params(8));
    let mut reporter = CollectingReporter::default();

    let err = driver.execute(&mut env, &mut reporter).unwrap_err();
    assert!(matches!(
        err,
        BenchError::CaseFailed { index: 2, returned: 0, .. }
    ));
    // Failure hit during warm-up: nothing reported.
    assert!(reporter.results.is_empty());
    assert!(reporter.finished);
    assert_eq!(env.machine().pool_count(), 0);
}

/// Invalid parameters are rejected before any environment exists
#[test]
fn test_invalid_config_rejected_up_front() {
    let registry = registry();
    for burst in [0, 65] {
        assert!(
            BenchmarkDriver::new(&registry, config(1, burst), CancellationController::new())
                .is_err()
        );
    }
    assert!(
        BenchmarkDriver::new(&registry, config(0, 8), CancellationController::new()).is_err()
    );

    let mut cfg = config(1, 8);
    cfg.single_case = Some(registry.len() + 1);
    assert!(BenchmarkDriver::new(&registry, cfg, CancellationController::new()).is_err());
}
