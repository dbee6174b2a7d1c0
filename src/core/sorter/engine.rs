//! Engine facade bound by presentation layers.

use super::config::SortConfiguration;
use super::orchestrator::{CancellationToken, RunReport, RunState, Sorter};
use super::stats::RunStatistics;
use crate::core::classifier::{ClassifierAdapter, ClassifierState};
use crate::core::executor::OperationMode;
use crate::core::resolver::ConflictPolicy;
use crate::core::settings::Settings;
use crate::error::{ModelError, Result, SorterError};
use crate::events::{null_sender, EventChannel, EventReceiver, EventSender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Handle to a run executing on the worker thread
pub struct RunHandle {
    handle: JoinHandle<Result<RunReport>>,
    cancel: CancellationToken,
    events: EventReceiver,
}

impl RunHandle {
    /// Events emitted by this run
    pub fn events(&self) -> &EventReceiver {
        &self.events
    }

    /// Ask the worker to stop before the next file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end
    pub fn join(self) -> Result<RunReport> {
        self.handle.join().map_err(|_| SorterError::WorkerPanicked)?
    }

    /// Split into the event receiver and a joinable remainder
    pub fn into_parts(self) -> (EventReceiver, RunJoin) {
        (
            self.events,
            RunJoin {
                handle: self.handle,
                cancel: self.cancel,
            },
        )
    }
}

/// A run handle without its receiver
pub struct RunJoin {
    handle: JoinHandle<Result<RunReport>>,
    cancel: CancellationToken,
}

impl RunJoin {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn join(self) -> Result<RunReport> {
        self.handle.join().map_err(|_| SorterError::WorkerPanicked)?
    }
}

/// Clears the in-flight flag when the run ends, even by panic
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Mutable configuration plus observed state for one sorting engine.
///
/// Setters are validated lazily when a run starts. Only one run can be
/// in flight; a second start is rejected with `RunInProgress`.
pub struct SortEngine {
    config: Mutex<SortConfiguration>,
    sorter: Arc<Sorter>,
    classifier: Arc<ClassifierAdapter>,
    running: Arc<AtomicBool>,
}

impl SortEngine {
    /// Engine with built-in defaults
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    /// Engine seeded from a settings file
    pub fn from_settings(settings: &Settings) -> Self {
        let classifier = Arc::new(ClassifierAdapter::from_model_dir(
            &settings.ml.model_dir,
            settings.ml.confidence_threshold,
        ));
        let sorter = Sorter::builder()
            .rules(settings.category_rules())
            .scan_config(settings.scan_config())
            .classifier(classifier.clone())
            .build();

        let config = SortConfiguration {
            mode: OperationMode::from_copy_flag(settings.sort.copy_files),
            use_ml: settings.sort.use_ml,
            conflict_policy: settings.sort.conflict_resolution,
            ..SortConfiguration::default()
        };

        Self::with_sorter(sorter, classifier, config)
    }

    /// Engine over a prebuilt sorter.
    ///
    /// `classifier` should be the adapter the sorter consults.
    pub fn with_sorter(
        sorter: Sorter,
        classifier: Arc<ClassifierAdapter>,
        config: SortConfiguration,
    ) -> Self {
        classifier.set_enabled(config.use_ml);
        Self {
            config: Mutex::new(config),
            sorter: Arc::new(sorter),
            classifier,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn config_lock(&self) -> std::sync::MutexGuard<'_, SortConfiguration> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_source_dir(&self, path: impl Into<PathBuf>) {
        self.config_lock().source_dir = path.into();
    }

    pub fn set_target_dir(&self, path: impl Into<PathBuf>) {
        self.config_lock().target_dir = path.into();
    }

    pub fn set_copy_files(&self, copy_files: bool) {
        self.config_lock().mode = OperationMode::from_copy_flag(copy_files);
    }

    pub fn set_use_ml(&self, use_ml: bool) {
        self.config_lock().use_ml = use_ml;
        self.classifier.set_enabled(use_ml);
    }

    pub fn set_conflict_resolution(&self, policy: ConflictPolicy) {
        self.config_lock().conflict_policy = policy;
    }

    pub fn source_dir(&self) -> PathBuf {
        self.config_lock().source_dir.clone()
    }

    pub fn target_dir(&self) -> PathBuf {
        self.config_lock().target_dir.clone()
    }

    pub fn copy_files(&self) -> bool {
        self.config_lock().mode == OperationMode::Copy
    }

    pub fn use_ml(&self) -> bool {
        self.config_lock().use_ml
    }

    pub fn conflict_resolution(&self) -> ConflictPolicy {
        self.config_lock().conflict_policy
    }

    /// Snapshot of the configuration the next run will use
    pub fn configuration(&self) -> SortConfiguration {
        self.config_lock().clone()
    }

    pub fn ml_enabled(&self) -> bool {
        self.classifier.is_enabled()
    }

    pub fn ml_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    /// One-line classifier status
    pub fn ml_info(&self) -> String {
        self.classifier.status_summary()
    }

    pub fn classifier_state(&self) -> ClassifierState {
        self.classifier.state()
    }

    /// Load the model now instead of on the first ML run
    pub fn load_model(&self) -> std::result::Result<(), ModelError> {
        self.classifier.load()
    }

    pub fn model_location(&self) -> PathBuf {
        self.classifier.model_location()
    }

    pub fn stats(&self) -> RunStatistics {
        self.sorter.stats()
    }

    pub fn state(&self) -> RunState {
        self.sorter.state()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn claim(&self) -> Result<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SorterError::RunInProgress)?;
        Ok(RunGuard(self.running.clone()))
    }

    /// Run on the worker thread and return immediately
    pub fn start(&self) -> Result<RunHandle> {
        let guard = self.claim()?;
        let config = self.configuration();
        let sorter = self.sorter.clone();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (sender, receiver) = EventChannel::new();

        let handle = thread::Builder::new()
            .name("smartfile-sort".to_string())
            .spawn(move || {
                let _guard = guard;
                sorter.run_with_cancel(&config, &sender, &worker_cancel)
            })
            .map_err(SorterError::WorkerSpawn)?;

        Ok(RunHandle {
            handle,
            cancel,
            events: receiver,
        })
    }

    /// Run on the calling thread
    pub fn run_blocking(&self) -> Result<RunReport> {
        self.run_blocking_with_events(&null_sender())
    }

    /// Run on the calling thread, reporting to `events`
    pub fn run_blocking_with_events(&self, events: &EventSender) -> Result<RunReport> {
        let _guard = self.claim()?;
        let config = self.configuration();
        self.sorter
            .run_with_cancel(&config, events, &CancellationToken::new())
    }

    /// Validate the current configuration without running
    pub fn validate(&self) -> Result<()> {
        self.configuration().validate().map_err(SorterError::from)
    }

    /// Convenience for presentation layers that hold paths as `&Path`
    pub fn set_directories(&self, source: &Path, target: &Path) {
        let mut config = self.config_lock();
        config.source_dir = source.to_path_buf();
        config.target_dir = target.to_path_buf();
    }
}

impl Default for SortEngine {
    fn default() -> Self {
        Self::new()
    }
}
