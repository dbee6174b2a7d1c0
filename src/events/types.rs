//! Event type definitions for progress reporting.

use crate::core::classifier::ClassifierStatus;
use crate::core::rules::ClassificationSource;
use crate::core::sorter::{RunReport, RunStatistics};
use crate::error::FileOpErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the sorting engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Run lifecycle events
    Run(RunEvent),
    /// Per-file outcome events
    File(FileEvent),
    /// Classifier lifecycle events
    Classifier(ClassifierEvent),
}

/// Lifecycle of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Scanning finished and processing is about to begin
    Started { total: usize },
    /// Counters after each processed file
    Progress(RunProgress),
    /// The run reached a terminal state with statistics
    Finished { report: RunReport },
    /// Configuration was rejected; no file was touched
    Failed { message: String },
}

/// Progress information during processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    /// Snapshot of the counters
    pub stats: RunStatistics,
    /// File that was just processed
    pub current_path: PathBuf,
}

/// Outcome of one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileEvent {
    /// The file was placed at its destination
    Sorted {
        source: PathBuf,
        destination: PathBuf,
        category: String,
        classified_by: ClassificationSource,
    },
    /// A conflicting file already existed and policy was skip
    Skipped { source: PathBuf, existing: PathBuf },
    /// The file could not be placed; the run continues
    Failed {
        source: PathBuf,
        kind: Option<FileOpErrorKind>,
        message: String,
    },
}

/// Events from the classifier adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierEvent {
    /// Readiness changed
    StatusChanged { status: ClassifierStatus, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::File(FileEvent::Sorted {
            source: PathBuf::from("/inbox/a.jpg"),
            destination: PathBuf::from("/sorted/Images/a.jpg"),
            category: "Images".to_string(),
            classified_by: ClassificationSource::Rule,
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::File(FileEvent::Sorted { category, .. }) => {
                assert_eq!(category, "Images");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn progress_carries_counters() {
        let progress = RunProgress {
            stats: RunStatistics {
                total: 10,
                sorted: 4,
                skipped: 1,
                failed: 0,
            },
            current_path: PathBuf::from("/inbox/b.txt"),
        };

        let json = serde_json::to_string(&Event::Run(RunEvent::Progress(progress))).unwrap();
        assert!(json.contains("\"sorted\":4"));
    }
}
