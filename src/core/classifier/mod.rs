//! # Classifier Module
//!
//! Optional model-based classification with an explicit readiness lifecycle.
//!
//! ## Lifecycle
//! `Unloaded -> Loading -> Ready | Unavailable(reason)`
//!
//! Once `Ready`, the adapter stays ready for its lifetime. A failed load
//! leaves the adapter rule-only; a later `load()` retries.
//!
//! ## Example
//! ```rust,ignore
//! let adapter = ClassifierAdapter::from_model_dir("/var/lib/smartfile/models", 0.7);
//! if adapter.load().is_err() {
//!     println!("{}", adapter.status_summary());
//! }
//! ```

mod features;
mod model;
mod traits;

pub use features::{filename_tokens, size_bucket, FeatureExtractor, FEATURE_SEED};
pub use model::{CentroidModel, FileModelSource, ModelArtifact, MODEL_FILE_NAME, SUPPORTED_VERSION};
pub use traits::{ModelBackend, ModelSource, Prediction};

use crate::core::rules::ClassificationResult;
use crate::core::scanner::FileEntry;
use crate::error::ModelError;
use crate::events::{null_sender, ClassifierEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Default minimum confidence for a model result to win over rules
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Load lifecycle of the model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Unavailable(String),
}

/// Snapshot of the adapter's observable state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierState {
    /// User intent
    pub enabled: bool,
    /// Model loaded
    pub ready: bool,
    pub status: ClassifierStatus,
    pub status_message: String,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self {
            enabled: false,
            ready: false,
            status: ClassifierStatus::Unloaded,
            status_message: String::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: ClassifierState,
    backend: Option<Arc<dyn ModelBackend>>,
    last_error: Option<ModelError>,
    attempts: u64,
}

/// Wraps an optional model and owns its readiness state.
///
/// All methods take `&self`; the adapter can be shared across threads.
pub struct ClassifierAdapter {
    source: Box<dyn ModelSource>,
    threshold: f32,
    inner: RwLock<Inner>,
    load_guard: Mutex<()>,
}

impl ClassifierAdapter {
    /// Create an adapter over any model source.
    ///
    /// The threshold is clamped to 0.0-1.0.
    pub fn new(source: Box<dyn ModelSource>, threshold: f32) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_CONFIDENCE_THRESHOLD
        };

        Self {
            source,
            threshold,
            inner: RwLock::new(Inner::default()),
            load_guard: Mutex::new(()),
        }
    }

    /// Adapter reading `category_vectors.json` from `model_dir`
    pub fn from_model_dir(model_dir: impl Into<PathBuf>, threshold: f32) -> Self {
        Self::new(Box::new(FileModelSource::new(model_dir)), threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether a model result is confident enough to override rules
    pub fn accepts(&self, result: &ClassificationResult) -> bool {
        result.confidence >= self.threshold
    }

    /// Where the model is loaded from
    pub fn model_location(&self) -> PathBuf {
        self.source.location()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.write().state.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.read().state.enabled
    }

    pub fn is_ready(&self) -> bool {
        self.read().state.ready
    }

    pub fn status(&self) -> ClassifierStatus {
        self.read().state.status.clone()
    }

    /// Consistent copy of the whole state
    pub fn state(&self) -> ClassifierState {
        let mut state = self.read().state.clone();
        state.status_message = self.status_summary();
        state
    }

    /// Load the model without progress reporting
    pub fn load(&self) -> Result<(), ModelError> {
        self.load_with_events(&null_sender())
    }

    /// Load the model, reporting status changes.
    ///
    /// A no-op once ready. Concurrent callers are serialized: a caller
    /// that waited on another's attempt returns that attempt's result.
    pub fn load_with_events(&self, events: &EventSender) -> Result<(), ModelError> {
        let seen_attempts = {
            let inner = self.read();
            if inner.state.ready {
                return Ok(());
            }
            inner.attempts
        };

        let _guard = self.load_guard.lock().unwrap_or_else(|e| e.into_inner());

        {
            let inner = self.read();
            if inner.state.ready {
                return Ok(());
            }
            if inner.attempts != seen_attempts {
                return match &inner.last_error {
                    Some(error) => Err(error.clone()),
                    None => Ok(()),
                };
            }
        }

        self.transition(ClassifierStatus::Loading, events);
        tracing::info!(path = %self.source.location().display(), "Loading classification model");

        let outcome = self.source.load();

        let status = {
            let mut inner = self.write();
            inner.attempts += 1;
            match outcome {
                Ok(backend) => {
                    tracing::info!(model = %backend.describe(), "Classification model ready");
                    inner.backend = Some(Arc::from(backend));
                    inner.state.ready = true;
                    inner.last_error = None;
                    inner.state.status = ClassifierStatus::Ready;
                    Ok(())
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Model unavailable, using rules only");
                    inner.state.status = ClassifierStatus::Unavailable(error.to_string());
                    inner.last_error = Some(error.clone());
                    Err(error)
                }
            }
        };

        self.emit_status(events);
        status
    }

    fn transition(&self, status: ClassifierStatus, events: &EventSender) {
        self.write().state.status = status;
        self.emit_status(events);
    }

    fn emit_status(&self, events: &EventSender) {
        events.send(Event::Classifier(ClassifierEvent::StatusChanged {
            status: self.status(),
            message: self.status_summary(),
        }));
    }

    /// Score a file with the model.
    ///
    /// Returns None when the model is not ready or has no opinion.
    pub fn classify(&self, entry: &FileEntry) -> Option<ClassificationResult> {
        let backend = self.read().backend.clone()?;
        let prediction = backend.predict(entry)?;

        tracing::debug!(
            path = %entry.path.display(),
            category = %prediction.category,
            confidence = prediction.confidence,
            "Model prediction"
        );

        Some(ClassificationResult::model(prediction.category, prediction.confidence))
    }

    /// One-line human readable status
    pub fn status_summary(&self) -> String {
        let inner = self.read();
        let detail = match &inner.state.status {
            ClassifierStatus::Unloaded => "model not loaded".to_string(),
            ClassifierStatus::Loading => "loading model".to_string(),
            ClassifierStatus::Ready => {
                let model = inner
                    .backend
                    .as_ref()
                    .map(|b| b.describe())
                    .unwrap_or_default();
                format!("model ready ({}, threshold {:.2})", model, self.threshold)
            }
            ClassifierStatus::Unavailable(reason) => {
                format!("model unavailable, using rules only ({})", reason)
            }
        };

        if inner.state.enabled {
            format!("ML enabled: {}", detail)
        } else {
            format!("ML disabled: {}", detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::extension_of;
    use crate::events::EventChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        fail: bool,
        delay: Duration,
    }

    struct FixedBackend;

    impl ModelBackend for FixedBackend {
        fn predict(&self, _entry: &FileEntry) -> Option<Prediction> {
            Some(Prediction {
                category: "Receipts".to_string(),
                confidence: 0.8,
            })
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    impl ModelSource for CountingSource {
        fn load(&self) -> Result<Box<dyn ModelBackend>, ModelError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail {
                Err(ModelError::NotFound {
                    path: PathBuf::from("/models/category_vectors.json"),
                })
            } else {
                Ok(Box::new(FixedBackend))
            }
        }

        fn location(&self) -> PathBuf {
            PathBuf::from("/models/category_vectors.json")
        }
    }

    fn counting(fail: bool, delay: Duration) -> (ClassifierAdapter, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            loads: loads.clone(),
            fail,
            delay,
        };
        (ClassifierAdapter::new(Box::new(source), 0.7), loads)
    }

    fn entry(name: &str) -> FileEntry {
        let path = PathBuf::from("/inbox").join(name);
        FileEntry {
            extension: extension_of(&path),
            path,
            size_bytes: 10,
            mime_hint: None,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn starts_unloaded_and_not_ready() {
        let (adapter, loads) = counting(false, Duration::ZERO);
        assert!(!adapter.is_ready());
        assert_eq!(adapter.status(), ClassifierStatus::Unloaded);
        assert!(adapter.classify(&entry("a.txt")).is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_load_is_idempotent() {
        let (adapter, loads) = counting(false, Duration::ZERO);
        adapter.load().unwrap();
        adapter.load().unwrap();

        assert!(adapter.is_ready());
        assert_eq!(adapter.status(), ClassifierStatus::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let result = adapter.classify(&entry("a.txt")).unwrap();
        assert_eq!(result.category, "Receipts");
        assert!(adapter.accepts(&result));
    }

    #[test]
    fn failed_load_degrades_and_retries() {
        let (adapter, loads) = counting(true, Duration::ZERO);
        adapter.set_enabled(true);

        assert!(adapter.load().is_err());
        assert!(!adapter.is_ready());
        assert!(matches!(adapter.status(), ClassifierStatus::Unavailable(_)));
        assert!(adapter.status_summary().contains("unavailable"));

        assert!(adapter.load().is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_loads_run_once() {
        let (adapter, loads) = counting(false, Duration::from_millis(50));
        let adapter = Arc::new(adapter);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let adapter = adapter.clone();
                thread::spawn(move || adapter.load())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiting_caller_sees_failed_attempt() {
        let (adapter, loads) = counting(true, Duration::from_millis(50));
        let adapter = Arc::new(adapter);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let adapter = adapter.clone();
                thread::spawn(move || adapter.load())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_err());
        }
        assert!(loads.load(Ordering::SeqCst) < 3);
    }

    #[test]
    fn load_emits_status_events() {
        let (adapter, _) = counting(false, Duration::ZERO);
        let (sender, receiver) = EventChannel::new();

        adapter.load_with_events(&sender).unwrap();
        drop(sender);

        let statuses: Vec<_> = receiver
            .iter()
            .filter_map(|event| match event {
                Event::Classifier(ClassifierEvent::StatusChanged { status, .. }) => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![ClassifierStatus::Loading, ClassifierStatus::Ready]);
    }

    #[test]
    fn threshold_is_clamped() {
        let (adapter, _) = counting(false, Duration::ZERO);
        assert_eq!(adapter.threshold(), 0.7);

        let high = ClassifierAdapter::from_model_dir("/nowhere", 3.0);
        assert_eq!(high.threshold(), 1.0);
        let nan = ClassifierAdapter::from_model_dir("/nowhere", f32::NAN);
        assert_eq!(nan.threshold(), DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn summary_reflects_intent() {
        let (adapter, _) = counting(false, Duration::ZERO);
        assert!(adapter.status_summary().starts_with("ML disabled"));
        adapter.set_enabled(true);
        adapter.load().unwrap();
        let summary = adapter.status_summary();
        assert!(summary.starts_with("ML enabled"));
        assert!(summary.contains("model ready"));
    }

    #[test]
    fn corrupt_artifact_leaves_rule_only_mode() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE_NAME), "[1, 2").unwrap();

        let adapter = ClassifierAdapter::from_model_dir(dir.path(), 0.7);
        let err = adapter.load().unwrap_err();

        assert!(matches!(err, ModelError::Corrupt { .. }));
        assert!(!adapter.is_ready());
        assert!(adapter.classify(&entry("a.txt")).is_none());
    }
}
