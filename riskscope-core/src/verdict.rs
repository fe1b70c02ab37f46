//! Verdicts - the immutable, auditable output of a scoring call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

use crate::{RiskError, RuleId, Signal, MAX_STRENGTH, MIN_STRENGTH};

/// Upper bound (exclusive) of the very_low tier
pub const VERY_LOW_CUTOFF: f64 = 0.25;

/// Upper bound (exclusive) of the low tier
pub const LOW_CUTOFF: f64 = 0.5;

/// Upper bound (exclusive) of the medium tier
pub const MEDIUM_CUTOFF: f64 = 0.75;

/// Coarse risk bucket derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    VeryLow,
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [RiskTier::VeryLow, RiskTier::Low, RiskTier::Medium, RiskTier::High];

    /// Fixed cut points: [0, .25) very_low, [.25, .5) low, [.5, .75) medium, [.75, 1] high
    pub fn from_score(score: f64) -> Self {
        if score < VERY_LOW_CUTOFF {
            RiskTier::VeryLow
        } else if score < LOW_CUTOFF {
            RiskTier::Low
        } else if score < MEDIUM_CUTOFF {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::VeryLow => "very_low",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// Display label, e.g. "Very Low"
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::VeryLow => "Very Low",
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one firing rule added to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub rule_id: RuleId,
    pub rule_name: String,
    /// Strongest matching signal strength
    pub strength: f64,
    /// weight * strength
    pub contribution: f64,
}

/// Result of scoring a signal set against a rule snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVerdict")]
pub struct Verdict {
    score: f64,
    tier: RiskTier,
    matched_rules: Vec<RuleId>,
    signals: Vec<Signal>,
    computed_at: DateTime<Utc>,
    contributions: Vec<Contribution>,
}

impl Verdict {
    pub(crate) fn new(
        score: f64,
        contributions: Vec<Contribution>,
        signals: Vec<Signal>,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            tier: RiskTier::from_score(score),
            matched_rules: contributions.iter().map(|c| c.rule_id).collect(),
            signals,
            computed_at,
            contributions,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn tier(&self) -> RiskTier {
        self.tier
    }

    pub fn matched_rules(&self) -> &[RuleId] {
        &self.matched_rules
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    /// Whether `rule` fired in this verdict
    pub fn fired(&self, rule: RuleId) -> bool {
        self.matched_rules.contains(&rule)
    }

    /// No rule fired
    pub fn is_empty(&self) -> bool {
        self.matched_rules.is_empty()
    }

    /// SHA-256 over everything except `computed_at`
    pub fn digest(&self) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            score: f64,
            tier: RiskTier,
            matched_rules: &'a [RuleId],
            signals: &'a [Signal],
            contributions: &'a [Contribution],
        }

        let canonical = Canonical {
            score: self.score,
            tier: self.tier,
            matched_rules: &self.matched_rules,
            signals: &self.signals,
            contributions: &self.contributions,
        };

        let mut hasher = Sha256::new();
        match serde_json::to_vec(&canonical) {
            Ok(json) => hasher.update(&json),
            Err(e) => {
                warn!("Verdict digest fell back to the summary line: {}", e);
                hasher.update(self.summary().as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }

    /// One-line description for activity records
    pub fn summary(&self) -> String {
        if self.matched_rules.is_empty() {
            return format!(
                "{} risk (score {:.2}) from {} signal(s), no rules fired",
                self.tier.label(),
                self.score,
                self.signals.len()
            );
        }

        let names: Vec<&str> = self.contributions.iter().map(|c| c.rule_name.as_str()).collect();
        format!(
            "{} risk (score {:.2}) from {} signal(s); rules fired: {}",
            self.tier.label(),
            self.score,
            self.signals.len(),
            names.join(", ")
        )
    }
}

/// Allowed drift between a stored score and the sum of its contributions
const SCORE_TOLERANCE: f64 = 1e-9;

/// Unvalidated wire form; a stored verdict must still satisfy every scoring invariant
#[derive(Deserialize)]
struct RawVerdict {
    score: f64,
    tier: RiskTier,
    #[serde(default)]
    matched_rules: Vec<RuleId>,
    #[serde(default)]
    signals: Vec<Signal>,
    computed_at: DateTime<Utc>,
    #[serde(default)]
    contributions: Vec<Contribution>,
}

impl TryFrom<RawVerdict> for Verdict {
    type Error = RiskError;

    fn try_from(raw: RawVerdict) -> Result<Self, Self::Error> {
        if !raw.score.is_finite() || !(MIN_STRENGTH..=MAX_STRENGTH).contains(&raw.score) {
            return Err(RiskError::validation(format!("verdict score {} outside [0, 1]", raw.score)));
        }

        let expected = RiskTier::from_score(raw.score);
        if raw.tier != expected {
            return Err(RiskError::validation(format!(
                "tier {} does not match score {} (expected {})",
                raw.tier, raw.score, expected
            )));
        }

        for c in &raw.contributions {
            let strength_ok = c.strength.is_finite() && (MIN_STRENGTH..=MAX_STRENGTH).contains(&c.strength);
            if !strength_ok || !c.contribution.is_finite() || c.contribution < 0.0 {
                return Err(RiskError::validation(format!(
                    "rule {} has an invalid contribution ({} from strength {})",
                    c.rule_id, c.contribution, c.strength
                )));
            }
        }

        let fired: Vec<RuleId> = raw.contributions.iter().map(|c| c.rule_id).collect();
        if raw.matched_rules != fired {
            return Err(RiskError::validation(
                "matched_rules does not match the rules in contributions",
            ));
        }

        let total: f64 = raw.contributions.iter().map(|c| c.contribution).sum();
        if (total.min(MAX_STRENGTH) - raw.score).abs() > SCORE_TOLERANCE {
            return Err(RiskError::validation(format!(
                "score {} does not match its contributions ({})",
                raw.score, total
            )));
        }

        Ok(Self {
            score: raw.score,
            tier: raw.tier,
            matched_rules: raw.matched_rules,
            signals: raw.signals,
            computed_at: raw.computed_at,
            contributions: raw.contributions,
        })
    }
}
