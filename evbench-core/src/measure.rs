//! Time and Cycle Stamps
//!
//! Uses RDTSCP on x86_64 and CNTVCT_EL0 on AArch64 for minimal overhead
//! cycle counting, and `std::time::Instant` for wall-clock nanoseconds.
//! A [`Clock`] reads exactly one of the two, selected by [`MeasureUnit`],
//! so the stamp taken around a measured call carries no extra reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Inline cycle counter helpers ────────────────────────────────────────────

/// Read the CPU cycle/tick counter (platform-specific).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_cycles() -> u64 {
    // SAFETY: RDTSCP is available on all x86_64 CPUs since ~2006 and waits
    // for all prior instructions to complete before reading the counter.
    unsafe {
        let mut _aux: u32 = 0;
        std::arch::x86_64::__rdtscp(&mut _aux)
    }
}

/// Read the virtual counter timer on AArch64 (comparable to x86 TSC).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_cycles() -> u64 {
    let cnt: u64;
    // SAFETY: CNTVCT_EL0 is accessible from EL0 on all AArch64 implementations.
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nostack, nomem));
    }
    cnt
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_cycles() -> u64 {
    0
}

/// Whether this platform provides real cycle counters.
pub const HAS_CYCLE_COUNTER: bool = cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64");

// ─── MeasureUnit ─────────────────────────────────────────────────────────────

/// What a benchmark round is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureUnit {
    /// CPU cycles (or counter ticks on AArch64)
    #[default]
    Cycles,
    /// Wall-clock nanoseconds
    Time,
}

impl MeasureUnit {
    /// Header text used by reports, e.g. "time (nsec)"
    pub fn describe(self) -> &'static str {
        match self {
            MeasureUnit::Cycles => "CPU cycles",
            MeasureUnit::Time => "time (nsec)",
        }
    }

    /// Short unit label, e.g. "nsec"
    pub fn label(self) -> &'static str {
        match self {
            MeasureUnit::Cycles => "cycles",
            MeasureUnit::Time => "nsec",
        }
    }
}

impl fmt::Display for MeasureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MeasureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cycles" | "cpu-cycles" => Ok(MeasureUnit::Cycles),
            "time" | "ns" | "nsec" => Ok(MeasureUnit::Time),
            other => Err(format!("Unknown measurement unit: {}", other)),
        }
    }
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Monotonic stamp source for one measurement unit.
///
/// `read()` returns nanoseconds since the clock was created (time mode) or
/// the raw cycle counter (cycles mode). Differences between two reads of the
/// same clock are the elapsed cost in that unit.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    unit: MeasureUnit,
    epoch: std::time::Instant,
}

impl Clock {
    /// Create a clock for the given unit
    pub fn new(unit: MeasureUnit) -> Self {
        Self {
            unit,
            epoch: std::time::Instant::now(),
        }
    }

    /// Unit this clock reads
    pub fn unit(&self) -> MeasureUnit {
        self.unit
    }

    /// Take a stamp
    #[inline(always)]
    pub fn read(&self) -> u64 {
        match self.unit {
            MeasureUnit::Cycles => read_cycles(),
            MeasureUnit::Time => self.epoch.elapsed().as_nanos() as u64,
        }
    }

    /// Elapsed units between two stamps of this clock
    #[inline(always)]
    pub fn diff(&self, end: u64, start: u64) -> u64 {
        end.saturating_sub(start)
    }
}

/// Set CPU affinity to pin the current thread to a specific core
///
/// This improves TSC stability by avoiding core migrations.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    // SAFETY: cpu_set_t is plain data; zeroed is its empty state.
    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// CPU pinning is not supported on this platform; always succeeds.
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    Ok(())
}
