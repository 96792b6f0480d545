//! Benchmark Cases and Registry
//!
//! A [`BenchCase`] is a record of plain function pointers over a shared
//! context type `C`: an optional `init`, the measured `run`, and an optional
//! `term`. A [`BenchRegistry`] is the ordered, immutable table of cases for
//! one suite; its order is both execution order and the reported index.

use crate::error::BenchError;

/// Measured operation: returns a positive count on success, `<= 0` on failure
pub type RunFn<C> = fn(&mut C) -> i64;

/// Setup or teardown hook of a case
pub type HookFn<C> = fn(&mut C) -> Result<(), BenchError>;

/// One measurable operation
pub struct BenchCase<C> {
    /// Stable identifier, used for display when no display name is set
    pub name: &'static str,
    /// The measured operation
    pub run: RunFn<C>,
    /// Prepares resources consumed by `run`
    pub init: Option<HookFn<C>>,
    /// Releases what `init` (or `run`) created
    pub term: Option<HookFn<C>>,
    /// Per-case round ceiling (0 = use the global round count)
    pub max_rounds: u32,
    /// Overrides `name` in reports
    pub display_name: Option<&'static str>,
}

// Manual impls: fn pointers are Copy for any C, derive would demand C: Clone.
impl<C> Clone for BenchCase<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for BenchCase<C> {}

impl<C> std::fmt::Debug for BenchCase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchCase")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .field("term", &self.term.is_some())
            .field("max_rounds", &self.max_rounds)
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl<C> BenchCase<C> {
    /// Case with only a measured operation
    pub const fn new(name: &'static str, run: RunFn<C>) -> Self {
        Self {
            name,
            run,
            init: None,
            term: None,
            max_rounds: 0,
            display_name: None,
        }
    }

    /// Attach a setup hook
    pub const fn with_init(mut self, init: HookFn<C>) -> Self {
        self.init = Some(init);
        self
    }

    /// Attach a teardown hook
    pub const fn with_term(mut self, term: HookFn<C>) -> Self {
        self.term = Some(term);
        self
    }

    /// Cap the number of measured rounds for slow operations
    pub const fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Override the reported name
    pub const fn with_display_name(mut self, display_name: &'static str) -> Self {
        self.display_name = Some(display_name);
        self
    }

    /// Name shown in diagnostics: the display name if set, else `name`
    pub fn label(&self) -> &'static str {
        self.display_name.unwrap_or(self.name)
    }

    /// Round count actually used for this case under a global count
    pub fn effective_rounds(&self, rounds: u32) -> u32 {
        if self.max_rounds > 0 && rounds > self.max_rounds {
            self.max_rounds
        } else {
            rounds
        }
    }
}

/// Ordered, immutable sequence of cases sharing a repeat count
pub struct BenchRegistry<C> {
    cases: Vec<BenchCase<C>>,
    repeat_count: u32,
    name_prefix: &'static str,
}

impl<C> std::fmt::Debug for BenchRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchRegistry")
            .field("cases", &self.cases)
            .field("repeat_count", &self.repeat_count)
            .field("name_prefix", &self.name_prefix)
            .finish()
    }
}

impl<C> BenchRegistry<C> {
    /// Build a registry. `repeat_count` is the number of operations every
    /// `run` performs per invocation (clamped to at least 1).
    pub fn new(cases: Vec<BenchCase<C>>, repeat_count: u32) -> Self {
        Self {
            cases,
            repeat_count: repeat_count.max(1),
            name_prefix: "",
        }
    }

    /// Prefix prepended to `name` when a case has no display name
    pub fn with_name_prefix(mut self, prefix: &'static str) -> Self {
        self.name_prefix = prefix;
        self
    }

    /// Operations performed per `run` invocation
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Prefix for default-formatted names
    pub fn name_prefix(&self) -> &'static str {
        self.name_prefix
    }

    /// Number of cases
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the registry has no cases
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Case at a 0-based position
    pub fn get(&self, idx: usize) -> Option<&BenchCase<C>> {
        self.cases.get(idx)
    }

    /// Cases in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, BenchCase<C>> {
        self.cases.iter()
    }

    /// Name as it appears in reports: display name verbatim, otherwise
    /// the registry prefix followed by `name`
    pub fn report_name(&self, case: &BenchCase<C>) -> String {
        match case.display_name {
            Some(name) => name.to_string(),
            None => format!("{}{}", self.name_prefix, case.name),
        }
    }
}

/// Environment owned by the driver for a whole execution
///
/// Setup runs once before the first case; teardown runs once at the end,
/// also after failures, and must release whatever setup managed to create.
pub trait Environment {
    /// Create pools, queues and other shared resources
    fn setup(&mut self) -> Result<(), BenchError> {
        Ok(())
    }

    /// Release everything created by `setup`
    fn teardown(&mut self) -> Result<(), BenchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut ()) -> i64 {
        1
    }

    #[test]
    fn effective_rounds_prefers_smaller_cap() {
        let case = BenchCase::new("slow", noop).with_max_rounds(10);
        assert_eq!(case.effective_rounds(1000), 10);
        assert_eq!(case.effective_rounds(5), 5);

        let uncapped = BenchCase::new("fast", noop);
        assert_eq!(uncapped.effective_rounds(1000), 1000);
    }

    #[test]
    fn report_name_uses_prefix_only_without_display_name() {
        let registry = BenchRegistry::new(
            vec![
                BenchCase::new("core_id", noop),
                BenchCase::new("event_free", noop).with_display_name("em_free(sw)"),
            ],
            1000,
        )
        .with_name_prefix("em_");

        let names: Vec<_> = registry.iter().map(|c| registry.report_name(c)).collect();
        assert_eq!(names, vec!["em_core_id", "em_free(sw)"]);
        assert_eq!(registry.get(1).unwrap().label(), "em_free(sw)");
    }

    #[test]
    fn repeat_count_is_at_least_one() {
        let registry: BenchRegistry<()> = BenchRegistry::new(Vec::new(), 0);
        assert_eq!(registry.repeat_count(), 1);
        assert!(registry.is_empty());
    }
}
