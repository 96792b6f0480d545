#![warn(missing_docs)]
//! Evbench Core - Driver Runtime
//!
//! Suite-agnostic pieces of a micro-benchmark driver:
//! - `BenchCase` / `BenchRegistry` describing init/run/term triples
//! - `BenchmarkDriver` running a warm-up pass and a measured pass
//! - `ResourceProvisioner` for bulk acquisition with bounded retries
//! - `CancellationController` bridging SIGINT to the driver loop
//! - Cycle/time stamping and CPU pinning

mod cancel;
mod case;
mod context;
mod driver;
mod error;
mod measure;
mod provision;
mod report;

pub use cancel::CancellationController;
pub use case::{BenchCase, BenchRegistry, Environment, HookFn, RunFn};
pub use context::{DriverConfig, MAX_BURST, Phase, RunContext};
pub use driver::{BenchmarkDriver, ExecutionSummary};
pub use error::{BenchError, ConfigError, ProvisionError};
/// Whether this platform provides hardware cycle counters (x86_64 RDTSCP or AArch64 CNTVCT_EL0).
/// When `false`, the cycles unit reads as 0.
pub use measure::HAS_CYCLE_COUNTER;
pub use measure::{Clock, MeasureUnit, pin_to_cpu};
pub use provision::{MAX_RETRY, ResourcePool, ResourceProvisioner};
pub use report::{CaseResult, CollectingReporter, Reporter};
