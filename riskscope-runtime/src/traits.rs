//! Ports to the external persistence and audit layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use riskscope_core::{RiskError, Verdict};

/// Errors from the scoring service
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("Store error: {0}")]
    Store(String),
}

impl RuntimeError {
    /// HTTP-equivalent status for the external CRUD layer
    pub fn status_code(&self) -> u16 {
        match self {
            RuntimeError::Risk(e) => e.status_code(),
            RuntimeError::Store(_) => 500,
        }
    }
}

/// Which area of the system an activity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Photo,
    Fraud,
    Phishing,
    Rules,
    Custom,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Photo => "photo",
            ActionType::Fraud => "fraud",
            ActionType::Phishing => "phishing",
            ActionType::Rules => "rules",
            ActionType::Custom => "custom",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored verdict, keyed by subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub id: Uuid,
    pub subject: String,
    pub action: ActionType,
    pub digest: String,
    pub verdict: Verdict,
}

impl VerdictRecord {
    pub fn new(subject: &str, action: ActionType, verdict: Verdict) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            action,
            digest: verdict.digest(),
            verdict,
        }
    }
}

/// One human-readable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub actor: String,
    pub action: ActionType,
    pub subject: Option<String>,
    pub description: String,
    pub verdict_digest: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(actor: &str, action: ActionType, description: String) -> Self {
        Self {
            actor: actor.to_string(),
            action,
            subject: None,
            description,
            verdict_digest: None,
            recorded_at: Utc::now(),
        }
    }

    /// Describe a stored verdict
    pub fn for_verdict(actor: &str, record: &VerdictRecord) -> Self {
        Self {
            actor: actor.to_string(),
            action: record.action,
            subject: Some(record.subject.clone()),
            description: format!(
                "{} ran a {} check on {}: {}",
                actor,
                record.action,
                record.subject,
                record.verdict.summary()
            ),
            verdict_digest: Some(record.digest.clone()),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only verdict persistence
pub trait VerdictStore: Send + Sync {
    fn append(&self, record: VerdictRecord) -> Result<(), RuntimeError>;

    /// All verdicts for a subject, oldest first
    fn history(&self, subject: &str) -> Vec<VerdictRecord>;

    fn latest(&self, subject: &str) -> Option<VerdictRecord> {
        self.history(subject).pop()
    }
}

/// Activity / audit sink
pub trait ActivityLogger: Send + Sync {
    fn record(&self, record: ActivityRecord);
}
