//! Error taxonomy for a benchmark execution

use thiserror::Error;

/// Invalid run configuration, detected before any case executes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Burst size outside `1..=max`
    #[error("Invalid burst size {value} (must be 1..={max})")]
    InvalidBurst {
        /// Requested burst size
        value: u32,
        /// Largest accepted burst size
        max: u32,
    },

    /// Zero measured rounds
    #[error("Invalid test cycle repeat count: {0}")]
    InvalidRounds(u32),

    /// Single-case index past the end of the registry
    #[error("Bad bench index {index} (suite has {count} cases)")]
    IndexOutOfRange {
        /// Requested 1-based index
        index: usize,
        /// Number of registered cases
        count: usize,
    },

    /// A named numeric setting out of its range
    #[error("Invalid {what}: {value}")]
    InvalidValue {
        /// Setting name
        what: &'static str,
        /// Rejected value
        value: i64,
    },
}

/// Resource provisioning failures. Both variants are fatal to the run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Allocator kept yielding nothing past the retry ceiling
    #[error(
        "resource exhaustion: acquired {acquired} of {requested} after {retries} consecutive empty allocations"
    )]
    Exhausted {
        /// Resources held when giving up
        acquired: usize,
        /// Resources asked for
        requested: usize,
        /// Consecutive empty batches seen
        retries: u32,
    },

    /// Allocator reported a hard error; never retried
    #[error("allocation error after acquiring {acquired} of {requested}: {source}")]
    Allocator {
        /// Resources held when the error hit
        acquired: usize,
        /// Resources asked for
        requested: usize,
        /// Error reported by the allocator
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Anything that ends a benchmark execution in the FAILED state
#[derive(Debug, Error)]
pub enum BenchError {
    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bulk acquisition failed
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// `run` returned a non-positive result
    #[error("Benchmark [{index:02}] {name} failed (returned {returned})")]
    CaseFailed {
        /// 1-based case index
        index: usize,
        /// Report name of the case
        name: String,
        /// Value `run` returned
        returned: i64,
    },

    /// `init` or `term` of a case could not complete
    #[error("Benchmark [{index:02}] {name}: {stage} failed")]
    CaseStage {
        /// 1-based case index
        index: usize,
        /// Report name of the case
        name: String,
        /// Hook that failed, "init" or "term"
        stage: &'static str,
        /// Error raised by the hook
        #[source]
        source: Box<BenchError>,
    },

    /// A resource operation inside a hook failed
    #[error("{op} failed: {source}")]
    Operation {
        /// Name of the failed operation
        op: &'static str,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Environment setup failed
    #[error("environment setup failed: {0}")]
    Setup(String),

    /// Environment teardown failed
    #[error("environment teardown failed: {0}")]
    Teardown(String),

    /// Writing the report failed
    #[error("report output failed: {0}")]
    Report(#[from] std::io::Error),
}

impl BenchError {
    /// Build a setup error from any displayable cause
    pub fn setup(cause: impl std::fmt::Display) -> Self {
        BenchError::Setup(cause.to_string())
    }

    /// Wrap the error of a named resource operation
    pub fn operation(op: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        BenchError::Operation {
            op,
            source: Box::new(source),
        }
    }

    /// Build a teardown error from any displayable cause
    pub fn teardown(cause: impl std::fmt::Display) -> Self {
        BenchError::Teardown(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_bad_value() {
        let err = ConfigError::InvalidBurst { value: 65, max: 64 };
        assert_eq!(err.to_string(), "Invalid burst size 65 (must be 1..=64)");
        let err = ConfigError::IndexOutOfRange { index: 70, count: 65 };
        assert_eq!(err.to_string(), "Bad bench index 70 (suite has 65 cases)");
        // Config errors pass through BenchError unchanged.
        let err: BenchError = ConfigError::InvalidRounds(0).into();
        assert_eq!(err.to_string(), "Invalid test cycle repeat count: 0");
    }

    #[test]
    fn case_stage_keeps_its_source() {
        let err = BenchError::CaseStage {
            index: 3,
            name: "em_free".to_string(),
            stage: "init",
            source: Box::new(BenchError::setup("no pool")),
        };
        assert_eq!(err.to_string(), "Benchmark [03] em_free: init failed");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("environment setup failed: no pool"));
    }
}
