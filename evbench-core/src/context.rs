//! Per-execution run state

use crate::cancel::CancellationController;
use crate::measure::MeasureUnit;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest burst size accepted for `*_multi` operations
pub const MAX_BURST: u32 = 64;

/// Validated-on-use driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Time or cycles
    pub unit: MeasureUnit,
    /// Measured rounds per case
    pub rounds: u32,
    /// Burst size for `*_multi` operations
    pub burst_size: u32,
    /// 1-based case to run indefinitely (`None` = run all)
    pub single_case: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            unit: MeasureUnit::Cycles,
            rounds: 1000,
            burst_size: 8,
            single_case: None,
        }
    }
}

impl DriverConfig {
    /// Check the configuration against a registry of `case_count` cases
    pub fn validate(&self, case_count: usize) -> Result<(), crate::ConfigError> {
        if self.burst_size < 1 || self.burst_size > MAX_BURST {
            return Err(crate::ConfigError::InvalidBurst {
                value: self.burst_size,
                max: MAX_BURST,
            });
        }
        if self.rounds < 1 {
            return Err(crate::ConfigError::InvalidRounds(self.rounds));
        }
        if let Some(index) = self.single_case {
            if index < 1 || index > case_count {
                return Err(crate::ConfigError::IndexOutOfRange {
                    index,
                    count: case_count,
                });
            }
        }
        Ok(())
    }
}

/// Execution state machine
///
/// ```text
/// Setup → WarmUp → Measure → Teardown → {Done, Failed}
/// Setup → Indefinite → {Cancelled, Failed}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Environment creation
    Setup,
    /// Pass 0, results discarded
    WarmUp,
    /// Pass 1, results reported
    Measure,
    /// Single case looping until cancelled
    Indefinite,
    /// Environment release
    Teardown,
    /// All cases measured (or the loop was cancelled)
    Done,
    /// Indefinite mode stopped by cancellation
    Cancelled,
    /// A case, setup or teardown failed
    Failed,
}

impl Phase {
    /// Whether the execution has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled | Phase::Failed)
    }

    /// Pass index driven in this phase (0 = warm-up, 1 = measured)
    pub fn pass(self) -> Option<usize> {
        match self {
            Phase::WarmUp => Some(0),
            Phase::Measure => Some(1),
            _ => None,
        }
    }
}

/// State owned by the driver's single worker for one execution
#[derive(Debug)]
pub struct RunContext {
    config: DriverConfig,
    cancel: CancellationController,
    phase: Phase,
    case_index: usize,
    round: u32,
    total: u64,
    executions: u64,
    cancelled: bool,
}

impl RunContext {
    /// Fresh context in the `Setup` phase
    pub fn new(config: DriverConfig, cancel: CancellationController) -> Self {
        Self {
            config,
            cancel,
            phase: Phase::Setup,
            case_index: 0,
            round: 0,
            total: 0,
            executions: 0,
            cancelled: false,
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Burst size for `*_multi` operations
    pub fn burst_size(&self) -> u32 {
        self.config.burst_size
    }

    /// Global round count
    pub fn rounds(&self) -> u32 {
        self.config.rounds
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 0-based index of the case being driven
    pub fn case_index(&self) -> usize {
        self.case_index
    }

    /// Rounds completed for the current case
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Accumulated elapsed units for the current case
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Rounds (or indefinite iterations) executed so far, all passes
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Whether cancellation cut the execution short
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Poll the cancellation flag, latching the observation
    pub fn should_stop(&mut self) -> bool {
        if self.cancel.is_requested() {
            self.cancelled = true;
        }
        self.cancelled
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    pub(crate) fn begin_case(&mut self, index: usize) {
        self.case_index = index;
        self.round = 0;
        self.total = 0;
    }

    pub(crate) fn record_round(&mut self, elapsed: u64) {
        self.round += 1;
        self.total = self.total.saturating_add(elapsed);
        self.executions += 1;
    }

    pub(crate) fn record_iteration(&mut self) {
        self.executions += 1;
    }
}
