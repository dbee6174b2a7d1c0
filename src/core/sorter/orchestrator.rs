//! Per-run coordination of scanning, classification and placement.

use super::config::SortConfiguration;
use super::stats::{FileTally, RunStatistics, StatsCell};
use crate::core::classifier::ClassifierAdapter;
use crate::core::executor::FileExecutor;
use crate::core::resolver::{ConflictDecision, ConflictResolver};
use crate::core::rules::{CategoryRules, ClassificationResult, ClassificationSource, OTHER_CATEGORY};
use crate::core::scanner::{FileEntry, ScanConfig, SourceScanner, WalkDirScanner};
use crate::error::{Result, SorterError};
use crate::events::{null_sender, Event, EventSender, FileEvent, RunEvent, RunProgress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

/// Where the sorter is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Scanning,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

impl RunState {
    /// A run is currently scanning or processing
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Scanning | RunState::Processing)
    }
}

/// Terminal result of a run that got past validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    CompletedWithErrors,
    Cancelled,
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::CompletedWithErrors => RunState::CompletedWithErrors,
            RunOutcome::Cancelled => RunState::Cancelled,
        }
    }
}

/// Sorted files by classification stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub rule: usize,
    pub model: usize,
    pub fallback: usize,
}

impl SourceCounts {
    fn add(&mut self, source: ClassificationSource) {
        match source {
            ClassificationSource::Rule => self.rule += 1,
            ClassificationSource::Model => self.model += 1,
            ClassificationSource::Fallback => self.fallback += 1,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    pub stats: RunStatistics,
    /// Sorted files per category
    pub by_category: BTreeMap<String, usize>,
    pub by_source: SourceCounts,
    /// Entries the scanner could not read
    pub scan_errors: usize,
}

/// Cooperative cancellation flag, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Builder for the sorter
pub struct SorterBuilder {
    rules: CategoryRules,
    scan_config: ScanConfig,
    scanner: Option<Box<dyn SourceScanner>>,
    classifier: Option<Arc<ClassifierAdapter>>,
    resolver: ConflictResolver,
}

impl SorterBuilder {
    pub fn new() -> Self {
        Self {
            rules: CategoryRules::default(),
            scan_config: ScanConfig::default(),
            scanner: None,
            classifier: None,
            resolver: ConflictResolver::default(),
        }
    }

    /// Set the rule table
    pub fn rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    /// Set scanner configuration; the target is excluded per run
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    /// Replace the filesystem scanner
    pub fn scanner(mut self, scanner: Box<dyn SourceScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Attach a model adapter
    pub fn classifier(mut self, classifier: Arc<ClassifierAdapter>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the conflict resolver
    pub fn resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Sorter {
        Sorter {
            rules: self.rules,
            scan_config: self.scan_config,
            scanner: self.scanner,
            classifier: self.classifier,
            resolver: self.resolver,
            stats: StatsCell::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }
}

impl Default for SorterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts one source directory into a target tree.
///
/// The sorter is the only writer of its statistics and state; both can
/// be observed from other threads through `stats()` and `state()`.
pub struct Sorter {
    rules: CategoryRules,
    scan_config: ScanConfig,
    scanner: Option<Box<dyn SourceScanner>>,
    classifier: Option<Arc<ClassifierAdapter>>,
    resolver: ConflictResolver,
    stats: StatsCell,
    state: Arc<Mutex<RunState>>,
}

impl Sorter {
    pub fn builder() -> SorterBuilder {
        SorterBuilder::new()
    }

    pub fn stats(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn classifier(&self) -> Option<&Arc<ClassifierAdapter>> {
        self.classifier.as_ref()
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Run without events
    pub fn run(&self, config: &SortConfiguration) -> Result<RunReport> {
        self.run_with_events(config, &null_sender())
    }

    /// Run with event reporting
    pub fn run_with_events(
        &self,
        config: &SortConfiguration,
        events: &EventSender,
    ) -> Result<RunReport> {
        self.run_with_cancel(config, events, &CancellationToken::new())
    }

    /// Run with event reporting and cooperative cancellation.
    ///
    /// Only configuration errors are returned; per-file problems are
    /// counted as failed and reported through events.
    pub fn run_with_cancel(
        &self,
        config: &SortConfiguration,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        if let Err(error) = config.validate() {
            tracing::warn!(error = %error, "Sort run rejected");
            self.set_state(RunState::Failed);
            events.send(Event::Run(RunEvent::Failed {
                message: error.to_string(),
            }));
            return Err(SorterError::Config(error));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        self.stats.reset();
        self.set_state(RunState::Scanning);
        tracing::info!(
            %run_id,
            source = %config.source_dir.display(),
            target = %config.target_dir.display(),
            mode = %config.mode,
            policy = %config.conflict_policy,
            "Sort run started"
        );

        let use_model = self.prepare_model(config, events);

        let scan = match &self.scanner {
            Some(scanner) => scanner.scan(&config.source_dir),
            None => {
                let mut scan_config = self.scan_config.clone();
                scan_config.exclude.push(config.target_dir.clone());
                WalkDirScanner::new(scan_config).scan(&config.source_dir)
            }
        };
        let scan_errors = scan.errors.len();

        self.stats.set_total(scan.entries.len());
        events.send(Event::Run(RunEvent::Started {
            total: scan.entries.len(),
        }));
        self.set_state(RunState::Processing);

        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_source = SourceCounts::default();
        let mut cancelled = false;

        for entry in &scan.entries {
            if cancel.is_cancelled() {
                tracing::info!(%run_id, "Sort run cancelled");
                cancelled = true;
                break;
            }

            let tally = match self.process_entry(entry, config, use_model, events) {
                Placed::Sorted(classification) => {
                    *by_category.entry(classification.category).or_insert(0) += 1;
                    by_source.add(classification.source);
                    FileTally::Sorted
                }
                Placed::Skipped => FileTally::Skipped,
                Placed::Failed => FileTally::Failed,
            };

            let stats = self.stats.record(tally);
            events.send(Event::Run(RunEvent::Progress(RunProgress {
                stats,
                current_path: entry.path.clone(),
            })));
        }

        let stats = self.stats.snapshot();
        let outcome = if cancelled {
            RunOutcome::Cancelled
        } else if stats.failed > 0 {
            RunOutcome::CompletedWithErrors
        } else {
            RunOutcome::Completed
        };
        self.set_state(outcome.into());

        let report = RunReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            outcome,
            stats,
            by_category,
            by_source,
            scan_errors,
        };

        tracing::info!(
            %run_id,
            total = stats.total,
            sorted = stats.sorted,
            skipped = stats.skipped,
            failed = stats.failed,
            outcome = ?outcome,
            "Sort run finished"
        );
        events.send(Event::Run(RunEvent::Finished {
            report: report.clone(),
        }));

        Ok(report)
    }

    /// Load the model lazily; true when it should be consulted
    fn prepare_model(&self, config: &SortConfiguration, events: &EventSender) -> bool {
        if !config.use_ml {
            return false;
        }

        let Some(classifier) = &self.classifier else {
            tracing::warn!("ML requested but no classifier is configured, using rules only");
            return false;
        };

        if !classifier.is_ready() {
            // Failure is logged by the adapter and leaves rules in charge
            let _ = classifier.load_with_events(events);
        }
        classifier.is_ready()
    }

    /// Rules first; a confident model result overrides; else `Other`
    pub fn classify(&self, entry: &FileEntry, use_model: bool) -> ClassificationResult {
        let rule = self
            .rules
            .classify(entry.extension.as_deref(), entry.mime_hint.as_deref());

        if use_model {
            if let Some(classifier) = self.classifier.as_ref().filter(|c| c.is_ready()) {
                if let Some(result) = classifier.classify(entry) {
                    if classifier.accepts(&result) {
                        return result;
                    }
                    tracing::debug!(
                        path = %entry.path.display(),
                        confidence = result.confidence,
                        threshold = classifier.threshold(),
                        "Model result below threshold, using rules"
                    );
                }
            }
        }

        rule.unwrap_or_else(ClassificationResult::fallback)
    }

    fn process_entry(
        &self,
        entry: &FileEntry,
        config: &SortConfiguration,
        use_model: bool,
        events: &EventSender,
    ) -> Placed {
        let classification = self.classify(entry, use_model);

        let Some(file_name) = entry.file_name() else {
            return fail(events, entry, None, "file has no name".to_string());
        };
        let destination = config
            .target_dir
            .join(category_dir_name(&classification.category))
            .join(file_name);

        if destination == entry.path {
            tracing::debug!(path = %entry.path.display(), "Already in place");
            events.send(Event::File(FileEvent::Skipped {
                source: entry.path.clone(),
                existing: destination,
            }));
            return Placed::Skipped;
        }

        let decision = match self.resolver.resolve(&destination, config.conflict_policy) {
            Ok(decision) => decision,
            Err(error) => return fail(events, entry, None, error.to_string()),
        };

        let (final_path, overwrite) = match decision {
            ConflictDecision::Skip => {
                tracing::info!(
                    source = %entry.path.display(),
                    existing = %destination.display(),
                    "Skipped, destination exists"
                );
                events.send(Event::File(FileEvent::Skipped {
                    source: entry.path.clone(),
                    existing: destination,
                }));
                return Placed::Skipped;
            }
            ConflictDecision::Proceed { final_path, overwrite } => (final_path, overwrite),
        };

        match FileExecutor::execute(entry, &final_path, config.mode, overwrite) {
            Ok(outcome) => {
                tracing::info!(
                    source = %entry.path.display(),
                    destination = %outcome.destination.display(),
                    category = %classification.category,
                    classified_by = %classification.source,
                    "Sorted"
                );
                events.send(Event::File(FileEvent::Sorted {
                    source: entry.path.clone(),
                    destination: outcome.destination,
                    category: classification.category.clone(),
                    classified_by: classification.source,
                }));
                Placed::Sorted(classification)
            }
            Err(error) => fail(events, entry, Some(error.kind), error.to_string()),
        }
    }
}

enum Placed {
    Sorted(ClassificationResult),
    Skipped,
    Failed,
}

fn fail(
    events: &EventSender,
    entry: &FileEntry,
    kind: Option<crate::error::FileOpErrorKind>,
    message: String,
) -> Placed {
    tracing::warn!(path = %entry.path.display(), error = %message, "Failed to sort file");
    events.send(Event::File(FileEvent::Failed {
        source: entry.path.clone(),
        kind,
        message,
    }));
    Placed::Failed
}

/// A category label as a single safe directory name
pub fn category_dir_name(label: &str) -> PathBuf {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        PathBuf::from(OTHER_CATEGORY)
    } else {
        Path::new(&cleaned).to_path_buf()
    }
}
