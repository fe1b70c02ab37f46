//! Scoring Service
//!
//! The boundary the external CRUD layer calls into:
//! - Detector adapters turn raw input into signals
//! - The aggregator scores them against a registry snapshot
//! - Verdicts are appended to the store, keyed by subject
//! - Every assessment and rule change is recorded as activity

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use riskscope_core::{
    Aggregator, NewRule, RiskTier, Rule, RuleId, RulePatch, RuleRegistry, Signal,
};
use riskscope_detectors::{
    Detector, EmailMessage, FaceDetector, FaceDetectorConfig, FaceObservation, FraudDetector,
    FraudDetectorConfig, PhishingDetector, PhishingDetectorConfig,
};

use crate::{
    ActionType, ActivityLogger, ActivityRecord, InMemoryVerdictStore, RuntimeError,
    TracingActivityLogger, VerdictRecord, VerdictStore,
};

/// Detector configuration, owned by the caller
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub face: FaceDetectorConfig,
    pub fraud: FraudDetectorConfig,
    pub phishing: PhishingDetectorConfig,
}

/// One independent scoring request
#[derive(Debug, Clone)]
pub struct Assessment {
    pub subject: String,
    pub actor: String,
    pub action: ActionType,
    pub signals: Vec<Signal>,
}

impl Assessment {
    pub fn new(subject: &str, actor: &str, action: ActionType, signals: Vec<Signal>) -> Self {
        Self {
            subject: subject.to_string(),
            actor: actor.to_string(),
            action,
            signals,
        }
    }
}

/// Aggregate view over a subject's verdict history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectStatistics {
    pub total: usize,
    pub average_score: f64,
    pub by_tier: BTreeMap<RiskTier, usize>,
    pub latest_at: Option<DateTime<Utc>>,
}

/// Scoring service
pub struct ScoringService {
    aggregator: Aggregator,
    store: Arc<dyn VerdictStore>,
    activity: Arc<dyn ActivityLogger>,
    face: FaceDetector,
    fraud: FraudDetector,
    phishing: PhishingDetector,
}

impl ScoringService {
    /// Create a service with explicit collaborators
    pub fn new(
        registry: Arc<RuleRegistry>,
        store: Arc<dyn VerdictStore>,
        activity: Arc<dyn ActivityLogger>,
        config: ServiceConfig,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            aggregator: Aggregator::new(registry),
            store,
            activity,
            face: FaceDetector::new(config.face)?,
            fraud: FraudDetector::new(config.fraud)?,
            phishing: PhishingDetector::new(config.phishing),
        })
    }

    /// In-memory store, tracing activity log, default detectors
    pub fn with_defaults(registry: Arc<RuleRegistry>) -> Self {
        Self {
            aggregator: Aggregator::new(registry),
            store: Arc::new(InMemoryVerdictStore::new()),
            activity: Arc::new(TracingActivityLogger),
            face: FaceDetector::default(),
            fraud: FraudDetector::default(),
            phishing: PhishingDetector::default(),
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        self.aggregator.registry()
    }

    /// Score signals for a subject, store the verdict and record the activity
    pub fn assess(
        &self,
        subject: &str,
        actor: &str,
        action: ActionType,
        signals: &[Signal],
    ) -> Result<VerdictRecord, RuntimeError> {
        let verdict = self.aggregator.score(signals);
        let record = VerdictRecord::new(subject, action, verdict);

        self.store.append(record.clone())?;
        self.activity.record(ActivityRecord::for_verdict(actor, &record));

        info!(
            "Assessed {} ({}): score {:.2}, tier {}",
            subject,
            action,
            record.verdict.score(),
            record.verdict.tier()
        );
        Ok(record)
    }

    /// Score independent subjects in parallel, one worker per available core.
    ///
    /// Results come back in batch order.
    pub fn assess_many(&self, batch: Vec<Assessment>) -> Vec<Result<VerdictRecord, RuntimeError>> {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = cores.min(batch.len()).max(1);
        let chunk_size = batch.len().div_ceil(workers).max(1);
        debug!("Assessing batch of {} on {} workers", batch.len(), workers);

        thread::scope(|scope| {
            let spawned: Vec<_> = batch
                .chunks(chunk_size)
                .map(|chunk| {
                    let worker = thread::Builder::new()
                        .name("riskscope-assess".into())
                        .spawn_scoped(scope, move || self.assess_chunk(chunk));
                    (chunk, worker)
                })
                .collect();

            spawned
                .into_iter()
                .flat_map(|(chunk, worker)| match worker {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        (0..chunk.len())
                            .map(|_| Err(RuntimeError::Store("assessment worker panicked".into())))
                            .collect()
                    }),
                    Err(e) => {
                        warn!("Could not spawn assessment worker, scoring {} inline: {}", chunk.len(), e);
                        self.assess_chunk(chunk)
                    }
                })
                .collect()
        })
    }

    fn assess_chunk(&self, chunk: &[Assessment]) -> Vec<Result<VerdictRecord, RuntimeError>> {
        chunk
            .iter()
            .map(|item| self.assess(&item.subject, &item.actor, item.action, &item.signals))
            .collect()
    }

    /// Phishing analysis of an email
    pub fn analyze_email(
        &self,
        subject: &str,
        actor: &str,
        email: &EmailMessage,
    ) -> Result<VerdictRecord, RuntimeError> {
        let signals = self.phishing.detect(email)?;
        self.assess(subject, actor, ActionType::Phishing, &signals)
    }

    /// Fraud check of a flat JSON payload
    pub fn check_fraud(&self, subject: &str, actor: &str, data: &Value) -> Result<VerdictRecord, RuntimeError> {
        let signals = self.fraud.detect(data)?;
        self.assess(subject, actor, ActionType::Fraud, &signals)
    }

    /// Risk of a photo from face-detector output
    pub fn analyze_face(
        &self,
        subject: &str,
        actor: &str,
        observation: &FaceObservation,
    ) -> Result<VerdictRecord, RuntimeError> {
        let signals = self.face.detect(observation)?;
        self.assess(subject, actor, ActionType::Photo, &signals)
    }

    pub fn add_rule(&self, actor: &str, rule: NewRule) -> Result<RuleId, RuntimeError> {
        let name = rule.name.clone();
        let id = self.registry().add(rule)?;
        self.activity.record(ActivityRecord::new(
            actor,
            ActionType::Rules,
            format!("{} created rule {} '{}'", actor, id, name),
        ));
        Ok(id)
    }

    pub fn update_rule(&self, actor: &str, id: RuleId, patch: RulePatch) -> Result<Rule, RuntimeError> {
        let rule = self.registry().update(id, patch)?;
        self.activity.record(ActivityRecord::new(
            actor,
            ActionType::Rules,
            format!("{} updated rule {} '{}'", actor, id, rule.name),
        ));
        Ok(rule)
    }

    pub fn set_rule_enabled(&self, actor: &str, id: RuleId, enabled: bool) -> Result<(), RuntimeError> {
        self.registry().set_enabled(id, enabled)?;
        self.activity.record(ActivityRecord::new(
            actor,
            ActionType::Rules,
            format!("{} {} rule {}", actor, if enabled { "enabled" } else { "disabled" }, id),
        ));
        Ok(())
    }

    pub fn history(&self, subject: &str) -> Vec<VerdictRecord> {
        self.store.history(subject)
    }

    pub fn latest(&self, subject: &str) -> Option<VerdictRecord> {
        self.store.latest(subject)
    }

    pub fn statistics(&self, subject: &str) -> SubjectStatistics {
        let history = self.store.history(subject);

        let mut by_tier: BTreeMap<RiskTier, usize> = RiskTier::ALL.iter().map(|t| (*t, 0)).collect();
        for record in &history {
            *by_tier.entry(record.verdict.tier()).or_default() += 1;
        }

        let average_score = if history.is_empty() {
            0.0
        } else {
            history.iter().map(|r| r.verdict.score()).sum::<f64>() / history.len() as f64
        };

        SubjectStatistics {
            total: history.len(),
            average_score,
            by_tier,
            latest_at: history.last().map(|r| r.verdict.computed_at()),
        }
    }
}
