//! Seams between the adapter and concrete models.

use crate::core::scanner::FileEntry;
use crate::error::ModelError;
use std::path::PathBuf;

/// A model's best guess for one file
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub category: String,
    /// Clamped to 0.0-1.0
    pub confidence: f32,
}

/// A loaded model that can score files
///
/// Implementations must be deterministic: the same entry always yields
/// the same prediction.
pub trait ModelBackend: Send + Sync {
    /// Best category for the entry, or None when the model has no opinion
    fn predict(&self, entry: &FileEntry) -> Option<Prediction>;

    /// Short description, e.g. "5 categories, 256 dimensions"
    fn describe(&self) -> String;
}

/// Where a model comes from
pub trait ModelSource: Send + Sync {
    /// Locate and deserialize the model
    fn load(&self) -> Result<Box<dyn ModelBackend>, ModelError>;

    /// Location shown in status messages
    fn location(&self) -> PathBuf;
}
