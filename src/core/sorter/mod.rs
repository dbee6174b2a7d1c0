//! # Sorter Module
//!
//! Coordinates a sorting run.
//!
//! ## Stages
//! 1. **Validate** - both directories exist, differ, and the target is writable
//! 2. **Scan** - enumerate regular files under the source, in path order
//! 3. **Process** - per file: classify, resolve conflicts, copy or move
//! 4. **Report** - final counters and a `RunReport`
//!
//! Files are processed strictly one at a time. `SortEngine` runs the
//! sorter on a worker thread and exposes its state to observers.

mod config;
mod engine;
mod orchestrator;
mod stats;

pub use config::SortConfiguration;
pub use engine::{RunHandle, RunJoin, SortEngine};
pub use orchestrator::{
    category_dir_name, CancellationToken, RunOutcome, RunReport, RunState, Sorter, SorterBuilder,
    SourceCounts,
};
pub use stats::{FileTally, RunStatistics, StatsCell};
