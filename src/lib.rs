//! # SmartFile Flow
//!
//! Sorts the files of a source directory into category folders.
//!
//! ## Core Philosophy
//! - **Never lose a file** - destinations are written atomically and a move
//!   only deletes its source after the copy is verified
//! - **Keep going** - one bad file is counted as failed, the batch continues
//! - **Rules first** - an optional model can only override rules when it is
//!   confident
//!
//! ## Architecture
//! The library is split into a core engine (presentation-agnostic) and layers:
//! - `core` - The classification and sorting engine
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types
//!
//! ## Example
//! ```rust,no_run
//! use smartfile_flow::SortEngine;
//!
//! let engine = SortEngine::new();
//! engine.set_source_dir("/home/me/Downloads");
//! engine.set_target_dir("/home/me/Sorted");
//! let report = engine.run_blocking()?;
//! println!("{} sorted", report.stats.sorted);
//! # Ok::<(), smartfile_flow::SorterError>(())
//! ```

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::{SortConfiguration, SortEngine, Sorter};
pub use error::{Result, SorterError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A subscriber installed earlier (e.g. by a test harness) wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
