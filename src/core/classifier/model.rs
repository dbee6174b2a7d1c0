//! Centroid model loaded from a JSON artifact.
//!
//! ```json
//! { "version": 1, "dimensions": 256, "categories": { "Images": [0.1, ...] } }
//! ```

use super::features::{dot, normalize, FeatureExtractor};
use super::traits::{ModelBackend, ModelSource, Prediction};
use crate::core::scanner::FileEntry;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the artifact inside the model directory
pub const MODEL_FILE_NAME: &str = "category_vectors.json";

/// The only artifact format this build understands
pub const SUPPORTED_VERSION: u32 = 1;

/// On-disk layout of the model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub dimensions: usize,
    pub categories: BTreeMap<String, Vec<f32>>,
}

impl ModelArtifact {
    /// Write the artifact as JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

/// One normalized centroid per category, scored by cosine similarity
#[derive(Debug, Clone)]
pub struct CentroidModel {
    extractor: FeatureExtractor,
    centroids: BTreeMap<String, Vec<f32>>,
}

impl CentroidModel {
    /// Validate an artifact and normalize its centroids.
    ///
    /// `path` is only used for error messages.
    pub fn from_artifact(artifact: ModelArtifact, path: &Path) -> Result<Self, ModelError> {
        if artifact.version != SUPPORTED_VERSION {
            return Err(ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported version {} (expected {})",
                    artifact.version, SUPPORTED_VERSION
                ),
            });
        }
        if artifact.dimensions == 0 {
            return Err(ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: "dimensions must be greater than zero".to_string(),
            });
        }
        if artifact.categories.is_empty() {
            return Err(ModelError::Corrupt {
                path: path.to_path_buf(),
                reason: "no categories".to_string(),
            });
        }

        let mut centroids = BTreeMap::new();
        for (label, mut vector) in artifact.categories {
            if vector.len() != artifact.dimensions {
                tracing::warn!(
                    category = %label,
                    length = vector.len(),
                    expected = artifact.dimensions,
                    "Dropping centroid with wrong length"
                );
                continue;
            }
            if vector.iter().all(|v| *v == 0.0) || vector.iter().any(|v| !v.is_finite()) {
                tracing::warn!(category = %label, "Dropping degenerate centroid");
                continue;
            }
            normalize(&mut vector);
            centroids.insert(label, vector);
        }

        if centroids.is_empty() {
            return Err(ModelError::Incompatible {
                path: path.to_path_buf(),
                reason: format!("no centroid matches {} dimensions", artifact.dimensions),
            });
        }

        Ok(Self {
            extractor: FeatureExtractor::new(artifact.dimensions),
            centroids,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.extractor.dimensions()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.centroids.keys().map(String::as_str)
    }
}

impl ModelBackend for CentroidModel {
    fn predict(&self, entry: &FileEntry) -> Option<Prediction> {
        let vector = self.extractor.vectorize(entry);

        // BTreeMap order breaks ties by label
        let mut best: Option<(&str, f32)> = None;
        for (label, centroid) in &self.centroids {
            let similarity = dot(&vector, centroid);
            if best.map(|(_, score)| similarity > score).unwrap_or(true) {
                best = Some((label, similarity));
            }
        }

        best.map(|(label, similarity)| Prediction {
            category: label.to_string(),
            confidence: similarity.clamp(0.0, 1.0),
        })
    }

    fn describe(&self) -> String {
        format!(
            "{} categories, {} dimensions",
            self.centroids.len(),
            self.dimensions()
        )
    }
}

/// Loads `category_vectors.json` from a model directory
#[derive(Debug, Clone)]
pub struct FileModelSource {
    model_dir: PathBuf,
}

impl FileModelSource {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE_NAME)
    }
}

impl ModelSource for FileModelSource {
    fn load(&self) -> Result<Box<dyn ModelBackend>, ModelError> {
        let path = self.artifact_path();

        let contents = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelError::NotFound { path: path.clone() },
            _ => ModelError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            },
        })?;

        let artifact: ModelArtifact =
            serde_json::from_str(&contents).map_err(|e| ModelError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let model = CentroidModel::from_artifact(artifact, &path)?;
        Ok(Box::new(model))
    }

    fn location(&self) -> PathBuf {
        self.artifact_path()
    }
}
