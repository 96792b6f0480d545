//! Reporter seam between the driver and output formatting

use crate::measure::MeasureUnit;
use serde::{Deserialize, Serialize};

/// Measured result of one case (measured pass only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    /// 1-based position in the registry
    pub index: usize,
    /// Name as reported (display name or prefixed default name)
    pub name: String,
    /// Whether `name` came from an explicit display name
    pub custom_name: bool,
    /// Rounds that contributed to the average
    pub rounds: u32,
    /// Sum of elapsed units over all rounds
    pub total: u64,
    /// Average cost per underlying operation
    pub average: f64,
}

impl CaseResult {
    /// `total / (rounds * repeat_count)`
    pub fn average_of(total: u64, rounds: u32, repeat_count: u32) -> f64 {
        let ops = rounds as f64 * repeat_count as f64;
        if ops > 0.0 { total as f64 / ops } else { 0.0 }
    }
}

/// Receives results as the driver produces them
pub trait Reporter {
    /// Called once, before the first result, with the measurement unit
    fn begin(&mut self, unit: MeasureUnit, repeat_count: u32) -> std::io::Result<()>;

    /// One completed case from the measured pass
    fn record(&mut self, result: &CaseResult) -> std::io::Result<()>;

    /// Called once after the last result (also after a failure)
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Warm-up pass progress (`done` of `total` cases)
    fn warmup_progress(&mut self, _done: usize, _total: usize) {}
}

/// Reporter that keeps results in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    /// Unit announced by `begin`, if called
    pub unit: Option<MeasureUnit>,
    /// Results in arrival order
    pub results: Vec<CaseResult>,
    /// Whether `finish` was called
    pub finished: bool,
}

impl Reporter for CollectingReporter {
    fn begin(&mut self, unit: MeasureUnit, _repeat_count: u32) -> std::io::Result<()> {
        self.unit = Some(unit);
        Ok(())
    }

    fn record(&mut self, result: &CaseResult) -> std::io::Result<()> {
        self.results.push(result.clone());
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_normalizes_by_rounds_and_repeat_count() {
        // 10 rounds x 1000 ops at 7 units each
        assert_eq!(CaseResult::average_of(70_000, 10, 1000), 7.0);
        assert_eq!(CaseResult::average_of(5, 0, 1000), 0.0);
    }
}
