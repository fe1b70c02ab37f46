//! In-memory verdict store and activity loggers

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;

use crate::{ActivityLogger, ActivityRecord, RuntimeError, VerdictRecord, VerdictStore};

/// Append-only verdict log per subject
#[derive(Debug, Default)]
pub struct InMemoryVerdictStore {
    records: DashMap<String, Vec<VerdictRecord>>,
}

impl InMemoryVerdictStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subjects with at least one verdict
    pub fn subject_count(&self) -> usize {
        self.records.len()
    }

    /// Total verdicts across subjects
    pub fn total(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }
}

impl VerdictStore for InMemoryVerdictStore {
    fn append(&self, record: VerdictRecord) -> Result<(), RuntimeError> {
        self.records
            .entry(record.subject.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    fn history(&self, subject: &str) -> Vec<VerdictRecord> {
        self.records
            .get(subject)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn latest(&self, subject: &str) -> Option<VerdictRecord> {
        self.records
            .get(subject)
            .and_then(|entry| entry.value().last().cloned())
    }
}

/// Emits activity records as `tracing` events
#[derive(Debug, Default)]
pub struct TracingActivityLogger;

impl ActivityLogger for TracingActivityLogger {
    fn record(&self, record: ActivityRecord) {
        info!(
            actor = %record.actor,
            action = %record.action,
            subject = record.subject.as_deref().unwrap_or("-"),
            digest = record.verdict_digest.as_deref().unwrap_or("-"),
            "{}",
            record.description
        );
    }
}

/// Collects activity records in memory
#[derive(Debug, Default)]
pub struct MemoryActivityLogger {
    records: Mutex<Vec<ActivityRecord>>,
}

impl MemoryActivityLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ActivityLogger for MemoryActivityLogger {
    fn record(&self, record: ActivityRecord) {
        self.records.lock().push(record);
    }
}
