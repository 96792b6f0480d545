#![warn(missing_docs)]
//! Evbench CLI Library
//!
//! Command line harness around the event suite: configuration discovery,
//! flag overrides, the worker thread, SIGINT wiring and report output.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     evbench_cli::run()
//! }
//! ```

mod config;
mod report;
mod suite;

pub use config::*;
pub use report::{
    HumanReporter, JsonCase, JsonReport, JsonReporter, NAME_WIDTH, format_result_line,
    reporter_for, write_options,
};
pub use suite::{EventBench, MAX_EVENTS, NAME_PREFIX, REPEAT_COUNT, SuiteParams, registry};

use anyhow::Context;
use clap::{Parser, Subcommand};
use evbench_core::{
    BenchmarkDriver, CancellationController, ExecutionSummary, HAS_CYCLE_COUNTER, MeasureUnit,
    Phase, pin_to_cpu,
};
use tracing::{debug, info, warn};

/// Evbench CLI arguments
#[derive(Parser, Debug, Default)]
#[command(name = "evbench")]
#[command(author, version, about = "Event API micro benchmarks")]
pub struct Cli {
    /// Optional subcommand (List, Run); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Test burst size for *_multi cases
    #[arg(short = 'b', long = "burst", global = true)]
    pub burst: Option<u32>,

    /// Pool cache size; -1 uses the pool default
    #[arg(short = 'c', long, global = true, allow_negative_numbers = true)]
    pub cache_size: Option<i64>,

    /// Test event size in bytes
    #[arg(short = 'e', long, global = true)]
    pub event_size: Option<usize>,

    /// Measure time in nanoseconds instead of CPU cycles
    #[arg(short = 't', long, global = true)]
    pub time: bool,

    /// Case index to run indefinitely until Ctrl-C (0 = run all)
    #[arg(short = 'i', long, global = true)]
    pub index: Option<usize>,

    /// Measured rounds per case
    #[arg(short = 'r', long, global = true)]
    pub rounds: Option<u32>,

    /// Test vector size
    #[arg(short = 'v', long, global = true)]
    pub vector_size: Option<usize>,

    /// User area bytes per event
    #[arg(long, global = true)]
    pub user_area_size: Option<usize>,

    /// Pin the worker thread to this CPU
    #[arg(long, global = true)]
    pub cpu: Option<usize>,

    /// Report format
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Print a default evbench.toml and exit
    #[arg(long)]
    pub init_config: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// List the cases of the suite with their indices
    List,
    /// Run the suite (default)
    Run,
}

impl Cli {
    /// Apply command line overrides on top of file configuration
    pub fn apply_overrides(&self, config: &mut EvbenchConfig) -> anyhow::Result<()> {
        if let Some(burst) = self.burst {
            config.runner.burst_size = burst;
        }
        if let Some(cache) = self.cache_size {
            config.pool.cache_size = if cache < 0 {
                None
            } else {
                Some(u32::try_from(cache).with_context(|| format!("Invalid cache size {cache}"))?)
            };
        }
        if let Some(size) = self.event_size {
            config.pool.event_size = size;
        }
        if self.time {
            config.runner.unit = MeasureUnit::Time;
        }
        if let Some(index) = self.index {
            config.runner.index = index;
        }
        if let Some(rounds) = self.rounds {
            config.runner.rounds = rounds;
        }
        if let Some(size) = self.vector_size {
            config.pool.vector_size = size;
        }
        if let Some(size) = self.user_area_size {
            config.pool.user_area_size = size;
        }
        if self.cpu.is_some() {
            config.runner.cpu = self.cpu;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        Ok(())
    }
}

/// Run the Evbench CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Evbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.init_config {
        print!("{}", EvbenchConfig::default_toml());
        return Ok(());
    }

    // Logs go to stderr; stdout carries the report.
    let filter = if cli.verbose {
        "evbench=debug"
    } else {
        "evbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config = match EvbenchConfig::discover()? {
        Some((path, config)) => {
            debug!(path = %path.display(), "loaded configuration");
            config
        }
        None => EvbenchConfig::default(),
    };
    cli.apply_overrides(&mut config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::List => list_cases(),
        Commands::Run => {
            let cancel = CancellationController::new();
            cancel
                .install_sigint_handler()
                .context("Failed to install SIGINT handler")?;
            let summary = run_suite(&config, cancel)?;
            match summary.state {
                Phase::Cancelled => info!(
                    iterations = summary.executions,
                    "indefinite run stopped by user"
                ),
                _ if summary.interrupted => info!(
                    reported = summary.reported,
                    "run interrupted, remaining cases skipped"
                ),
                _ => debug!(reported = summary.reported, "run complete"),
            }
            Ok(())
        }
    }
}

fn list_cases() -> anyhow::Result<()> {
    let registry = registry();
    println!("Evbench cases:");
    for (i, case) in registry.iter().enumerate() {
        println!("[{:02}] {}", i + 1, registry.report_name(case));
    }
    println!("{} cases, {} calls per round.", registry.len(), registry.repeat_count());
    Ok(())
}

/// Validate `config`, print the options block, and run the event suite on a
/// dedicated worker thread until completion, failure or cancellation.
pub fn run_suite(
    config: &EvbenchConfig,
    cancel: CancellationController,
) -> anyhow::Result<ExecutionSummary> {
    let driver_config = config.to_driver_config()?;
    let registry = registry();
    let driver = BenchmarkDriver::new(&registry, driver_config, cancel)?;

    if config.runner.unit == MeasureUnit::Cycles && !HAS_CYCLE_COUNTER {
        warn!("no cycle counter on this platform, results will read as zero");
    }

    let format = config.output.format;
    if format == OutputFormat::Human {
        let cpu = config
            .runner
            .cpu
            .map_or_else(|| "any".to_string(), |cpu| cpu.to_string());
        write_options(&mut std::io::stdout().lock(), config, &cpu)?;
    }

    let params = SuiteParams::new(config.runner.burst_size, &config.pool);
    let cpu = config.runner.cpu;

    let outcome = std::thread::scope(|s| {
        let worker = std::thread::Builder::new()
            .name("evbench-worker".to_string())
            .spawn_scoped(s, || {
                if let Some(cpu) = cpu {
                    match pin_to_cpu(cpu) {
                        Ok(()) => debug!(cpu, "worker pinned"),
                        Err(e) => warn!(cpu, error = %e, "failed to pin worker thread"),
                    }
                }
                let mut env = EventBench::new(params);
                let mut reporter = reporter_for(format);
                driver.execute(&mut env, reporter.as_mut())
            })
            .context("Failed to spawn worker thread")?;
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("Worker thread panicked"))
    })?;

    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let cli = Cli::parse_from([
            "evbench", "-b", "16", "-c", "32", "-t", "-r", "5", "--format", "json", "run",
        ]);
        let mut config = EvbenchConfig::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(cli.command, Some(Commands::Run));
        assert_eq!(config.runner.burst_size, 16);
        assert_eq!(config.pool.cache_size, Some(32));
        assert_eq!(config.runner.unit, MeasureUnit::Time);
        assert_eq!(config.runner.rounds, 5);
        assert_eq!(config.output.format, OutputFormat::Json);
        // Untouched values keep the file/default setting.
        assert_eq!(config.pool.event_size, 1024);
    }

    #[test]
    fn negative_cache_size_means_default() {
        let cli = Cli::parse_from(["evbench", "-c", "-1"]);
        let mut config = EvbenchConfig::default();
        config.pool.cache_size = Some(64);
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.pool.cache_size, None);
    }

    #[test]
    fn flags_after_subcommand_are_accepted() {
        let cli = Cli::parse_from(["evbench", "run", "-i", "3", "-v", "4"]);
        assert_eq!(cli.index, Some(3));
        assert_eq!(cli.vector_size, Some(4));
    }

    #[test]
    fn invalid_burst_fails_before_any_output() {
        let mut config = EvbenchConfig::default();
        config.runner.burst_size = 65;
        config.output.format = OutputFormat::Json;
        let err = run_suite(&config, CancellationController::new()).unwrap_err();
        assert!(err.to_string().contains("burst"));
    }
}
