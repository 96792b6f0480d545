//! Benchmark Driver
//!
//! Runs a [`BenchRegistry`] through two passes on the calling thread:
//!
//! ```text
//!   Environment::setup
//!          │
//!          ▼
//!   ┌──────────────┐   results discarded
//!   │ pass 0: warm │──────────────────────┐
//!   └──────┬───────┘                      │
//!          ▼                              │
//!   ┌──────────────┐   Reporter::record   │
//!   │ pass 1: meas │──────────────────────┤
//!   └──────┬───────┘                      │
//!          ▼                              ▼
//!   Environment::teardown  ◄──── also after any failure
//! ```
//!
//! Each round is `init → stamp → run → stamp → term`. A non-positive `run`
//! result aborts the whole execution. With a single-case index the selected
//! case loops `init → run → term` until cancellation instead.

use crate::cancel::CancellationController;
use crate::case::{BenchCase, BenchRegistry, Environment};
use crate::context::{DriverConfig, Phase, RunContext};
use crate::error::{BenchError, ConfigError};
use crate::measure::Clock;
use crate::report::{CaseResult, Reporter};
use tracing::{debug, error, info, warn};

/// How an execution that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Terminal phase: `Done` or `Cancelled`
    pub state: Phase,
    /// Report lines emitted during the measured pass
    pub reported: usize,
    /// Rounds plus indefinite iterations executed
    pub executions: u64,
    /// Cancellation was observed before all work completed
    pub interrupted: bool,
}

/// Drives one registry under one configuration
pub struct BenchmarkDriver<'r, C> {
    registry: &'r BenchRegistry<C>,
    config: DriverConfig,
    cancel: CancellationController,
}

impl<'r, C: Environment> BenchmarkDriver<'r, C> {
    /// Validate `config` against `registry` and build a driver.
    ///
    /// Configuration errors surface here, before any environment exists.
    pub fn new(
        registry: &'r BenchRegistry<C>,
        config: DriverConfig,
        cancel: CancellationController,
    ) -> Result<Self, ConfigError> {
        config.validate(registry.len())?;
        Ok(Self {
            registry,
            config,
            cancel,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Set up `env`, run the passes (or indefinite mode), always tear down.
    pub fn execute<R>(&self, env: &mut C, reporter: &mut R) -> Result<ExecutionSummary, BenchError>
    where
        R: Reporter + ?Sized,
    {
        let mut run = RunContext::new(self.config, self.cancel.clone());
        let mut reported = 0usize;

        info!(
            cases = self.registry.len(),
            rounds = self.config.rounds,
            burst = self.config.burst_size,
            unit = %self.config.unit,
            "starting benchmark execution"
        );

        let body = match env.setup() {
            Ok(()) => self.drive(&mut run, env, reporter, &mut reported),
            Err(e) => {
                error!(error = %e, "environment setup failed");
                Err(e)
            }
        };

        run.enter(Phase::Teardown);
        let teardown = env.teardown();
        let finish = reporter.finish();

        let result = match (body, teardown) {
            (Ok(state), Ok(())) => finish.map(|()| state).map_err(BenchError::from),
            (Ok(_), Err(e)) => {
                error!(error = %e, "environment teardown failed");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(t)) => {
                warn!(error = %t, "environment teardown failed after earlier failure");
                Err(e)
            }
        };

        match result {
            Ok(state) => {
                run.enter(state);
                Ok(ExecutionSummary {
                    state,
                    reported,
                    executions: run.executions(),
                    interrupted: run.was_cancelled(),
                })
            }
            Err(e) => {
                run.enter(Phase::Failed);
                Err(e)
            }
        }
    }

    fn drive<R>(
        &self,
        run: &mut RunContext,
        env: &mut C,
        reporter: &mut R,
        reported: &mut usize,
    ) -> Result<Phase, BenchError>
    where
        R: Reporter + ?Sized,
    {
        reporter.begin(self.config.unit, self.registry.repeat_count())?;
        let clock = Clock::new(self.config.unit);

        for phase in [Phase::WarmUp, Phase::Measure] {
            run.enter(phase);
            if let Some(terminal) = self.run_pass(run, env, reporter, &clock, reported)? {
                return Ok(terminal);
            }
        }

        Ok(Phase::Done)
    }

    /// One pass over the registry. Returns a terminal phase when indefinite
    /// mode took over.
    fn run_pass<R>(
        &self,
        run: &mut RunContext,
        env: &mut C,
        reporter: &mut R,
        clock: &Clock,
        reported: &mut usize,
    ) -> Result<Option<Phase>, BenchError>
    where
        R: Reporter + ?Sized,
    {
        let measured = run.phase() == Phase::Measure;
        let total = self.registry.len();

        for (idx, case) in self.registry.iter().enumerate() {
            if run.should_stop() {
                debug!(case = idx + 1, "cancelled before case");
                break;
            }

            if let Some(selected) = self.config.single_case {
                if selected != idx + 1 {
                    continue;
                }
                run.enter(Phase::Indefinite);
                return self.run_indefinite(run, env, idx, case).map(Some);
            }

            run.begin_case(idx);
            let ceiling = case.effective_rounds(self.config.rounds);

            while run.round() < ceiling && !run.should_stop() {
                let elapsed = self.run_round(env, idx, case, clock)?;
                run.record_round(elapsed);
            }

            if run.round() < ceiling {
                debug!(case = idx + 1, rounds = run.round(), "cancelled mid-case");
                break;
            }

            if measured {
                let result = CaseResult {
                    index: idx + 1,
                    name: self.registry.report_name(case),
                    custom_name: case.display_name.is_some(),
                    rounds: ceiling,
                    total: run.total(),
                    average: CaseResult::average_of(
                        run.total(),
                        ceiling,
                        self.registry.repeat_count(),
                    ),
                };
                reporter.record(&result)?;
                *reported += 1;
            } else {
                reporter.warmup_progress(idx + 1, total);
            }
        }

        Ok(None)
    }

    fn run_round(
        &self,
        env: &mut C,
        idx: usize,
        case: &BenchCase<C>,
        clock: &Clock,
    ) -> Result<u64, BenchError> {
        if let Some(init) = case.init {
            init(env).map_err(|e| self.stage_error(idx, case, "init", e))?;
        }

        let start = clock.read();
        let ret = (case.run)(env);
        let end = clock.read();

        if ret <= 0 {
            error!(case = idx + 1, name = case.label(), returned = ret, "benchmark failed");
            // Resources still go back before the run is torn down.
            if let Some(term) = case.term {
                if let Err(e) = term(env) {
                    warn!(case = idx + 1, error = %e, "term after failed run also failed");
                }
            }
            return Err(self.failure(idx, case, ret));
        }

        if let Some(term) = case.term {
            term(env).map_err(|e| self.stage_error(idx, case, "term", e))?;
        }

        Ok(clock.diff(end, start))
    }

    fn run_indefinite(
        &self,
        run: &mut RunContext,
        env: &mut C,
        idx: usize,
        case: &BenchCase<C>,
    ) -> Result<Phase, BenchError> {
        info!(case = idx + 1, name = case.label(), "running test indefinitely");

        while !run.should_stop() {
            if let Some(init) = case.init {
                init(env).map_err(|e| self.stage_error(idx, case, "init", e))?;
            }

            let ret = (case.run)(env);

            if let Some(term) = case.term {
                term(env).map_err(|e| self.stage_error(idx, case, "term", e))?;
            }
            run.record_iteration();

            if ret <= 0 {
                error!(case = idx + 1, name = case.label(), returned = ret, "benchmark failed");
                return Err(self.failure(idx, case, ret));
            }
        }

        debug!(iterations = run.executions(), "indefinite run cancelled");
        Ok(Phase::Cancelled)
    }

    fn failure(&self, idx: usize, case: &BenchCase<C>, returned: i64) -> BenchError {
        BenchError::CaseFailed {
            index: idx + 1,
            name: case.label().to_string(),
            returned,
        }
    }

    fn stage_error(
        &self,
        idx: usize,
        case: &BenchCase<C>,
        stage: &'static str,
        source: BenchError,
    ) -> BenchError {
        BenchError::CaseStage {
            index: idx + 1,
            name: case.label().to_string(),
            stage,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::MeasureUnit;
    use crate::report::CollectingReporter;

    /// Synthetic context counting every hook invocation
    #[derive(Default)]
    struct Counters {
        inits: u32,
        runs: u32,
        terms: u32,
        setups: u32,
        teardowns: u32,
        live: i32,
        fail_on_run: Option<u32>,
        cancel_after_runs: Option<(u32, CancellationController)>,
        fail_setup: bool,
        fail_teardown: bool,
    }

    impl Environment for Counters {
        fn setup(&mut self) -> Result<(), BenchError> {
            self.setups += 1;
            if self.fail_setup {
                return Err(BenchError::setup("pool create failed"));
            }
            Ok(())
        }

        fn teardown(&mut self) -> Result<(), BenchError> {
            self.teardowns += 1;
            if self.fail_teardown {
                return Err(BenchError::teardown("queue delete failed"));
            }
            Ok(())
        }
    }

    fn init(p: &mut Counters) -> Result<(), BenchError> {
        p.inits += 1;
        p.live += 1;
        Ok(())
    }

    fn term(p: &mut Counters) -> Result<(), BenchError> {
        p.terms += 1;
        p.live -= 1;
        Ok(())
    }

    fn run(p: &mut Counters) -> i64 {
        p.runs += 1;
        if let Some((after, cancel)) = &p.cancel_after_runs {
            if p.runs >= *after {
                cancel.request();
            }
        }
        if p.fail_on_run == Some(p.runs) { 0 } else { 1000 }
    }

    fn registry(n: usize) -> BenchRegistry<Counters> {
        let cases = (0..n)
            .map(|_| BenchCase::new("counted", run).with_init(init).with_term(term))
            .collect();
        BenchRegistry::new(cases, 1000)
    }

    fn config(rounds: u32) -> DriverConfig {
        DriverConfig {
            unit: MeasureUnit::Time,
            rounds,
            burst_size: 8,
            single_case: None,
        }
    }

    #[test]
    fn two_passes_report_only_measured() {
        let reg = registry(4);
        let driver = BenchmarkDriver::new(&reg, config(3), CancellationController::new()).unwrap();
        let mut ctx = Counters::default();
        let mut reporter = CollectingReporter::default();

        let summary = driver.execute(&mut ctx, &mut reporter).unwrap();

        assert_eq!(summary.state, Phase::Done);
        assert_eq!(summary.reported, 4);
        assert_eq!(summary.executions, 2 * 4 * 3);
        assert_eq!(ctx.runs, 2 * 4 * 3);
        assert_eq!(ctx.inits, ctx.terms);
        assert_eq!(ctx.live, 0);
        assert_eq!((ctx.setups, ctx.teardowns), (1, 1));

        let indices: Vec<_> = reporter.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(reporter.unit, Some(MeasureUnit::Time));
        assert!(reporter.finished);
    }

    #[test]
    fn max_rounds_caps_effective_rounds() {
        let reg = BenchRegistry::new(vec![BenchCase::new("slow", run).with_max_rounds(2)], 1000);
        let driver = BenchmarkDriver::new(&reg, config(10), CancellationController::new()).unwrap();
        let mut ctx = Counters::default();
        let mut reporter = CollectingReporter::default();

        driver.execute(&mut ctx, &mut reporter).unwrap();

        assert_eq!(ctx.runs, 2 * 2);
        let result = &reporter.results[0];
        assert_eq!(result.rounds, 2);
        // Average divides by the capped round count, not the configured one.
        assert_eq!(result.average, result.total as f64 / (2.0 * 1000.0));
    }

    #[test]
    fn average_is_per_call_over_reported_rounds() {
        let reg = BenchRegistry::new(
            vec![
                BenchCase::new("plain", run),
                BenchCase::new("hooked", run).with_init(init).with_term(term),
                BenchCase::new("capped", run).with_max_rounds(3),
            ],
            1000,
        );
        let driver = BenchmarkDriver::new(&reg, config(7), CancellationController::new()).unwrap();
        let mut ctx = Counters::default();
        let mut reporter = CollectingReporter::default();

        driver.execute(&mut ctx, &mut reporter).unwrap();

        let rounds: Vec<_> = reporter.results.iter().map(|r| r.rounds).collect();
        assert_eq!(rounds, vec![7, 7, 3]);
        for r in &reporter.results {
            let expected = r.total as f64 / (r.rounds as f64 * reg.repeat_count() as f64);
            assert_eq!(r.average, expected, "case {}", r.index);
        }
    }

    /// Busy-waits so one call of a 1000-call round costs about `SPIN_PER_CALL_NS`
    const SPIN_PER_CALL_NS: u64 = 1_000;

    fn spin(_: &mut Counters) -> i64 {
        let budget = std::time::Duration::from_nanos(SPIN_PER_CALL_NS * 1000);
        let start = std::time::Instant::now();
        while start.elapsed() < budget {
            std::hint::spin_loop();
        }
        1000
    }

    #[test]
    fn time_unit_average_tracks_per_call_cost() {
        let reg = BenchRegistry::new(vec![BenchCase::new("spin", spin)], 1000);
        let driver = BenchmarkDriver::new(&reg, config(3), CancellationController::new()).unwrap();
        let mut reporter = CollectingReporter::default();

        driver
            .execute(&mut Counters::default(), &mut reporter)
            .unwrap();

        let average = reporter.results[0].average;
        // The round can only take longer than the spin, never shorter.
        assert!(average >= SPIN_PER_CALL_NS as f64, "average {average}");
        assert!(average < 50.0 * SPIN_PER_CALL_NS as f64, "average {average}");
    }

    #[test]
    fn failed_run_aborts_remaining_cases() {
        let reg = registry(3);
        let driver = BenchmarkDriver::new(&reg, config(2), CancellationController::new()).unwrap();
        // Warm-up: case 1 uses runs 1-2, case 2 fails on run 3.
        let mut ctx = Counters {
            fail_on_run: Some(3),
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let err = driver.execute(&mut ctx, &mut reporter).unwrap_err();

        assert!(matches!(err, BenchError::CaseFailed { index: 2, returned: 0, .. }));
        assert_eq!(ctx.runs, 3);
        assert!(reporter.results.is_empty());
        assert_eq!(ctx.live, 0);
        assert_eq!(ctx.teardowns, 1);
    }

    #[test]
    fn cancellation_before_round_loop_stops_everything() {
        let reg = registry(3);
        let cancel = CancellationController::new();
        let driver = BenchmarkDriver::new(&reg, config(5), cancel.clone()).unwrap();
        let mut ctx = Counters::default();
        let mut reporter = CollectingReporter::default();

        cancel.request();
        let summary = driver.execute(&mut ctx, &mut reporter).unwrap();

        assert_eq!(ctx.runs, 0);
        assert_eq!(summary.reported, 0);
        assert!(summary.interrupted);
        assert_eq!(ctx.teardowns, 1);
    }

    #[test]
    fn cancellation_mid_case_drops_partial_result() {
        let reg = registry(2);
        let cancel = CancellationController::new();
        let driver = BenchmarkDriver::new(&reg, config(5), cancel.clone()).unwrap();
        // Pass 0 takes 10 runs; cancel during case 1 of pass 1.
        let mut ctx = Counters {
            cancel_after_runs: Some((12, cancel)),
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let summary = driver.execute(&mut ctx, &mut reporter).unwrap();

        assert_eq!(ctx.runs, 12);
        assert_eq!(summary.reported, 0);
        assert_eq!(summary.state, Phase::Done);
    }

    #[test]
    fn indefinite_mode_stops_after_cancel() {
        let reg = registry(3);
        let cancel = CancellationController::new();
        let cfg = DriverConfig {
            single_case: Some(2),
            ..config(5)
        };
        let driver = BenchmarkDriver::new(&reg, cfg, cancel.clone()).unwrap();
        let mut ctx = Counters {
            cancel_after_runs: Some((3, cancel)),
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let summary = driver.execute(&mut ctx, &mut reporter).unwrap();

        assert_eq!(summary.state, Phase::Cancelled);
        assert_eq!((ctx.inits, ctx.runs, ctx.terms), (3, 3, 3));
        assert_eq!(summary.executions, 3);
        assert!(reporter.results.is_empty());
    }

    #[test]
    fn indefinite_failure_is_fatal() {
        let reg = registry(1);
        let cfg = DriverConfig {
            single_case: Some(1),
            ..config(5)
        };
        let driver = BenchmarkDriver::new(&reg, cfg, CancellationController::new()).unwrap();
        let mut ctx = Counters {
            fail_on_run: Some(4),
            ..Default::default()
        };

        let err = driver
            .execute(&mut ctx, &mut CollectingReporter::default())
            .unwrap_err();

        assert!(matches!(err, BenchError::CaseFailed { index: 1, .. }));
        assert_eq!(ctx.runs, 4);
        assert_eq!(ctx.live, 0);
    }

    #[test]
    fn invalid_burst_rejected_before_setup() {
        let reg = registry(2);
        for burst in [0, 65] {
            let cfg = DriverConfig {
                burst_size: burst,
                ..config(1)
            };
            let err = BenchmarkDriver::new(&reg, cfg, CancellationController::new()).err();
            assert!(matches!(err, Some(ConfigError::InvalidBurst { .. })));
        }
    }

    #[test]
    fn setup_failure_still_tears_down() {
        let reg = registry(2);
        let driver = BenchmarkDriver::new(&reg, config(1), CancellationController::new()).unwrap();
        let mut ctx = Counters {
            fail_setup: true,
            ..Default::default()
        };

        let err = driver
            .execute(&mut ctx, &mut CollectingReporter::default())
            .unwrap_err();

        assert!(matches!(err, BenchError::Setup(_)));
        assert_eq!(ctx.runs, 0);
        assert_eq!(ctx.teardowns, 1);
    }

    #[test]
    fn teardown_failure_fails_successful_run() {
        let reg = registry(1);
        let driver = BenchmarkDriver::new(&reg, config(1), CancellationController::new()).unwrap();
        let mut ctx = Counters {
            fail_teardown: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();

        let err = driver.execute(&mut ctx, &mut reporter).unwrap_err();

        assert!(matches!(err, BenchError::Teardown(_)));
        // Results already reported stand.
        assert_eq!(reporter.results.len(), 1);
    }
}
