//! # Core Module
//!
//! The presentation-agnostic file sorting engine.
//!
//! ## Modules
//! - `rules` - Maps extensions and mime types to categories
//! - `classifier` - Optional model-based classification
//! - `scanner` - Enumerates files in the source directory
//! - `resolver` - Decides final paths when names collide
//! - `executor` - Copies or moves single files safely
//! - `sorter` - Orchestrates runs and exposes engine state
//! - `settings` - Optional TOML settings

pub mod classifier;
pub mod executor;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod settings;
pub mod sorter;

// Re-export commonly used types
pub use classifier::{ClassifierAdapter, ClassifierStatus};
pub use executor::OperationMode;
pub use resolver::{ConflictDecision, ConflictPolicy};
pub use rules::{CategoryRules, ClassificationResult, ClassificationSource};
pub use scanner::FileEntry;
pub use settings::Settings;
pub use sorter::{RunReport, RunState, RunStatistics, SortConfiguration, SortEngine, Sorter};
