//! Run progress hooks
//!
//! The engine reports stage boundaries and periodic progress through
//! [`RunObserver`]. The default observer does nothing; front ends plug in
//! progress bars.

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NameGrouping,
    ExactContainment,
    BufferedContainment,
    NameFallback,
    Validation,
    Aggregation,
    Indices,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::NameGrouping => "Grouping names",
            Stage::ExactContainment => "Exact containment",
            Stage::BufferedContainment => "Buffered containment",
            Stage::NameFallback => "Name fallback",
            Stage::Validation => "Validating assignments",
            Stage::Aggregation => "Aggregating",
            Stage::Indices => "Computing indices",
        }
    }
}

/// Receives progress events from a run
pub trait RunObserver {
    /// A stage is about to process `items` items
    fn stage_started(&mut self, _stage: Stage, _items: usize) {}

    /// `done` items of the current stage are processed
    fn stage_progress(&mut self, _stage: Stage, _done: usize) {}

    /// A stage is complete; `affected` is what it produced (links, corrections, rows)
    fn stage_finished(&mut self, _stage: Stage, _affected: usize) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// How often long stages report progress
pub(crate) const PROGRESS_INTERVAL: usize = 1000;
