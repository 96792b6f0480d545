#![warn(missing_docs)]
//! # Evbench
//!
//! Micro-benchmark driver for an event API, with warm-up discarding and
//! burst-sized operations.
//!
//! Evbench runs a registry of benchmark cases twice:
//! - **Warm-up pass**: every case runs its full round count, timings discarded
//! - **Measured pass**: the average cost per API call is reported per case
//! - **Single-case mode**: one case loops `init → run → term` until Ctrl-C
//! - **Fail-fast**: the first failing case aborts the run, teardown still runs
//! - **Bounded provisioning**: bulk allocation retries empty batches up to a ceiling
//! - **Cycles or time**: RDTSCP / CNTVCT_EL0 cycle stamps or wall-clock nanoseconds
//!
//! ## Custom suites
//!
//! ```ignore
//! use evbench::prelude::*;
//!
//! #[derive(Default)]
//! struct Counters { hits: u64 }
//! impl Environment for Counters {}
//!
//! fn bump(c: &mut Counters) -> i64 {
//!     for _ in 0..1000 { c.hits += 1; }
//!     1000
//! }
//!
//! let registry = BenchRegistry::new(vec![BenchCase::new("bump", bump)], 1000);
//! let driver = BenchmarkDriver::new(&registry, DriverConfig::default(), CancellationController::new())?;
//! let mut reporter = HumanReporter::new(std::io::stdout());
//! driver.execute(&mut Counters::default(), &mut reporter)?;
//! ```

// Re-export the driver runtime
pub use evbench_core::{
    BenchCase, BenchError, BenchRegistry, BenchmarkDriver, CancellationController, CaseResult,
    Clock, CollectingReporter, ConfigError, DriverConfig, Environment, ExecutionSummary,
    HAS_CYCLE_COUNTER, MAX_BURST, MAX_RETRY, MeasureUnit, Phase, ProvisionError, Reporter,
    ResourcePool, ResourceProvisioner, RunContext, pin_to_cpu,
};

// Re-export the event machine model
pub use evbench_pool::{
    EmError, Event, EventMachine, EventPool, EventType, PoolConfig, PoolId, QueueId, TypeTag,
};

// Re-export the harness
pub use evbench_cli::{
    Cli, Commands, EvbenchConfig, EventBench, HumanReporter, JsonReport, JsonReporter,
    OutputFormat, REPEAT_COUNT, SuiteParams, registry, run_suite, run_with_cli,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchCase, BenchRegistry, BenchmarkDriver, CancellationController, DriverConfig,
        Environment, HumanReporter, MeasureUnit, Reporter,
    };
}

/// Run the Evbench CLI harness.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     evbench::run()
/// }
/// ```
pub use evbench_cli::run;
