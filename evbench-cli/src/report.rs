//! Result Reporters
//!
//! [`HumanReporter`] prints one fixed-width line per measured case as soon as
//! it completes, with an indicatif bar on stderr during warm-up.
//! [`JsonReporter`] collects results and writes a single document at the end.

use crate::config::{EvbenchConfig, OutputFormat};
use evbench_core::{CaseResult, MeasureUnit, Reporter};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Width of the name column in result lines
pub const NAME_WIDTH: usize = 35;

/// Format one result line: `[NN] name<padded>: average`
pub fn format_result_line(result: &CaseResult) -> String {
    format!(
        "[{:02}] {:<width$}: {:>12.2}",
        result.index,
        result.name,
        result.average,
        width = NAME_WIDTH
    )
}

/// Write the options block shown before a run
pub fn write_options<W: Write>(out: &mut W, config: &EvbenchConfig, cpu: &str) -> io::Result<()> {
    let cache = match config.pool.cache_size {
        Some(size) => size.to_string(),
        None => "default".to_string(),
    };
    writeln!(out)?;
    writeln!(out, "evbench options")?;
    writeln!(out, "---------------")?;
    writeln!(out, "{:<19}{}", "Burst size:", config.runner.burst_size)?;
    writeln!(out, "{:<19}{}", "CPU:", cpu)?;
    writeln!(out, "{:<19}{}", "Event size:", config.pool.event_size)?;
    writeln!(out, "{:<19}{}", "Measurement unit:", config.runner.unit.label())?;
    writeln!(out, "{:<19}{}", "Pool cache size:", cache)?;
    writeln!(out, "{:<19}{}", "Test rounds:", config.runner.rounds)?;
    writeln!(out, "{:<19}{}", "Vector size:", config.pool.vector_size)?;
    writeln!(out)
}

/// Reporter for the configured output format, writing to stdout
pub fn reporter_for(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Human => Box::new(HumanReporter::new(io::stdout()).with_progress(true)),
        OutputFormat::Json => Box::new(JsonReporter::new(io::stdout())),
    }
}

// ─── Human ───────────────────────────────────────────────────────────────────

/// Fixed-width text output
pub struct HumanReporter<W: Write> {
    out: W,
    progress: bool,
    bar: Option<ProgressBar>,
}

impl<W: Write> HumanReporter<W> {
    /// Reporter writing to `out`, without a warm-up bar
    pub fn new(out: W) -> Self {
        Self {
            out,
            progress: false,
            bar: None,
        }
    }

    /// Show warm-up progress on stderr
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Consume the reporter, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn clear_bar(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl<W: Write> Reporter for HumanReporter<W> {
    fn begin(&mut self, unit: MeasureUnit, _repeat_count: u32) -> io::Result<()> {
        writeln!(self.out, "\nAverage {} per function call", unit.describe())?;
        writeln!(self.out, "{}", "-".repeat(54))?;
        self.out.flush()
    }

    fn record(&mut self, result: &CaseResult) -> io::Result<()> {
        self.clear_bar();
        writeln!(self.out, "{}", format_result_line(result))?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.clear_bar();
        writeln!(self.out)?;
        self.out.flush()
    }

    fn warmup_progress(&mut self, done: usize, total: usize) {
        if !self.progress {
            return;
        }
        let pb = self.bar.get_or_insert_with(|| {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message("warm-up");
            pb
        });
        pb.set_position(done as u64);
        if done >= total {
            pb.finish_with_message("warm-up complete");
        }
    }
}

// ─── JSON ────────────────────────────────────────────────────────────────────

/// One entry of the JSON report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCase {
    /// 1-based case index
    pub index: usize,
    /// Reported name
    pub name: String,
    /// Rounds averaged
    pub rounds: u32,
    /// Average per function call
    pub average: f64,
}

/// The JSON report document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    /// Measurement unit
    pub unit: MeasureUnit,
    /// Function calls per measured round
    pub repeat_count: u32,
    /// Results in execution order
    pub results: Vec<JsonCase>,
}

/// Collects results and writes one pretty-printed JSON document on finish
pub struct JsonReporter<W: Write> {
    out: W,
    report: Option<JsonReport>,
}

impl<W: Write> JsonReporter<W> {
    /// Reporter writing to `out`
    pub fn new(out: W) -> Self {
        Self { out, report: None }
    }

    /// Consume the reporter, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn begin(&mut self, unit: MeasureUnit, repeat_count: u32) -> io::Result<()> {
        self.report = Some(JsonReport {
            unit,
            repeat_count,
            results: Vec::new(),
        });
        Ok(())
    }

    fn record(&mut self, result: &CaseResult) -> io::Result<()> {
        let report = self
            .report
            .as_mut()
            .ok_or_else(|| io::Error::other("record before begin"))?;
        report.results.push(JsonCase {
            index: result.index,
            name: result.name.clone(),
            rounds: result.rounds,
            average: result.average,
        });
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        // Nothing to write when the run never got past setup.
        let Some(report) = self.report.take() else {
            return Ok(());
        };
        serde_json::to_writer_pretty(&mut self.out, &report)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
