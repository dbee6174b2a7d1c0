//! Deterministic feature hashing for model inference.
//!
//! Every file becomes a bag of string features (extension, size bucket,
//! mime type, filename tokens). Each feature is hashed with xxh3 at a
//! fixed seed into one slot of a fixed-width vector, which is then
//! L2-normalized.

use crate::core::scanner::FileEntry;
use regex::Regex;
use std::sync::OnceLock;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed shared with whatever produced the model's centroids
pub const FEATURE_SEED: u64 = 0x5346_4C4F_5700_0001;

const EXTENSION_WEIGHT: f32 = 3.0;
const MIME_WEIGHT: f32 = 2.0;
const SIZE_WEIGHT: f32 = 1.0;
const TOKEN_WEIGHT: f32 = 1.0;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\p{L}+|\p{N}+").expect("token pattern is valid"))
}

/// Named size bucket for a byte count
pub fn size_bucket(size_bytes: u64) -> &'static str {
    match size_bytes {
        0 => "empty",
        1..=1_023 => "tiny",
        1_024..=65_535 => "small",
        65_536..=1_048_575 => "medium",
        1_048_576..=16_777_215 => "large",
        16_777_216..=268_435_455 => "huge",
        _ => "giant",
    }
}

/// Lowercased word and number runs from a file stem
pub fn filename_tokens(stem: &str) -> Vec<String> {
    let lowered = stem.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Turns file entries into fixed-width vectors
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    dimensions: usize,
}

impl FeatureExtractor {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Weighted string features for one entry
    pub fn features(&self, entry: &FileEntry) -> Vec<(String, f32)> {
        let mut features = Vec::new();

        if let Some(ext) = &entry.extension {
            features.push((format!("ext:{}", ext), EXTENSION_WEIGHT));
        }
        if let Some(mime) = &entry.mime_hint {
            features.push((format!("mime:{}", mime.to_lowercase()), MIME_WEIGHT));
            if let Some((top, _)) = mime.split_once('/') {
                features.push((format!("mime_top:{}", top.to_lowercase()), MIME_WEIGHT));
            }
        }
        features.push((format!("size:{}", size_bucket(entry.size_bytes)), SIZE_WEIGHT));

        if let Some(stem) = entry.stem() {
            for token in filename_tokens(stem) {
                features.push((format!("tok:{}", token), TOKEN_WEIGHT));
            }
        }

        features
    }

    /// Hashed, L2-normalized feature vector
    pub fn vectorize(&self, entry: &FileEntry) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for (feature, weight) in self.features(entry) {
            let slot = (xxh3_64_with_seed(feature.as_bytes(), FEATURE_SEED) % self.dimensions as u64) as usize;
            vector[slot] += weight;
        }

        normalize(&mut vector);
        vector
    }
}

/// Scale to unit length; a zero vector is left as is
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two vectors of equal length
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
