//! Scoring rules
//!
//! A rule maps a set of signal kinds to a weighted contribution. It fires
//! when the strongest matching signal reaches its threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{RiskError, SignalKind};

/// Rule identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RuleId {
    fn from(value: u64) -> Self {
        RuleId(value)
    }
}

/// A registered scoring rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub applicable_kinds: BTreeSet<SignalKind>,
    pub weight: f64,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Whether this rule considers signals of `kind`
    pub fn applies_to(&self, kind: SignalKind) -> bool {
        self.applicable_kinds.contains(&kind)
    }
}

/// A rule that has not been registered yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    /// Explicit id; the registry assigns the next free id when absent
    #[serde(default)]
    pub id: Option<RuleId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "kinds")]
    pub applicable_kinds: BTreeSet<SignalKind>,
    pub weight: f64,
    pub threshold: f64,
}

fn default_enabled() -> bool {
    true
}

impl NewRule {
    pub fn new(name: &str, kinds: impl IntoIterator<Item = SignalKind>, weight: f64, threshold: f64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: String::new(),
            enabled: true,
            applicable_kinds: kinds.into_iter().collect(),
            weight,
            threshold,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(RuleId(id));
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub(crate) fn into_rule(self, id: RuleId, now: DateTime<Utc>) -> Result<Rule, RiskError> {
        let rule = Rule {
            id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            applicable_kinds: self.applicable_kinds,
            weight: self.weight,
            threshold: self.threshold,
            created_at: now,
            updated_at: now,
        };
        validate_rule(&rule)?;
        Ok(rule)
    }
}

/// Partial update of a rule; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, rename = "kinds")]
    pub applicable_kinds: Option<BTreeSet<SignalKind>>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl RulePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = SignalKind>) -> Self {
        self.applicable_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produce the patched rule, validated as a whole
    pub(crate) fn apply(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Rule, RiskError> {
        let mut patched = rule.clone();
        if let Some(name) = &self.name {
            patched.name = name.clone();
        }
        if let Some(description) = &self.description {
            patched.description = description.clone();
        }
        if let Some(enabled) = self.enabled {
            patched.enabled = enabled;
        }
        if let Some(kinds) = &self.applicable_kinds {
            patched.applicable_kinds = kinds.clone();
        }
        if let Some(weight) = self.weight {
            patched.weight = weight;
        }
        if let Some(threshold) = self.threshold {
            patched.threshold = threshold;
        }
        validate_rule(&patched)?;
        patched.updated_at = now;
        Ok(patched)
    }
}

/// Check the structural constraints every registered rule satisfies
pub fn validate_rule(rule: &Rule) -> Result<(), RiskError> {
    if rule.id.0 == 0 {
        return Err(RiskError::validation("rule id must be positive"));
    }
    if rule.name.trim().is_empty() {
        return Err(RiskError::validation("rule name must not be empty"));
    }
    if rule.applicable_kinds.is_empty() {
        return Err(RiskError::validation(format!(
            "rule '{}' has no applicable signal kinds",
            rule.name
        )));
    }
    if !rule.weight.is_finite() || rule.weight < 0.0 {
        return Err(RiskError::validation(format!(
            "rule '{}' weight {} must be a non-negative number",
            rule.name, rule.weight
        )));
    }
    if !rule.threshold.is_finite() || !(0.0..=1.0).contains(&rule.threshold) {
        return Err(RiskError::validation(format!(
            "rule '{}' threshold {} outside [0, 1]",
            rule.name, rule.threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewRule {
        NewRule::new("Mismatched URLs", [SignalKind::LinkDomainMismatch], 0.6, 0.5)
    }

    #[test]
    fn test_into_rule_validates() {
        let now = Utc::now();
        assert!(draft().into_rule(RuleId(1), now).is_ok());

        let mut negative = draft();
        negative.weight = -0.1;
        assert!(negative.into_rule(RuleId(1), now).is_err());

        let mut high = draft();
        high.threshold = 1.5;
        assert!(high.into_rule(RuleId(1), now).is_err());

        let mut no_kinds = draft();
        no_kinds.applicable_kinds.clear();
        assert!(no_kinds.into_rule(RuleId(1), now).is_err());

        let mut blank = draft();
        blank.name = "  ".to_string();
        assert!(blank.into_rule(RuleId(1), now).is_err());
    }

    #[test]
    fn test_patch_apply() {
        let now = Utc::now();
        let rule = draft().into_rule(RuleId(4), now).unwrap();

        let later = now + chrono::Duration::seconds(5);
        let patched = RulePatch::new()
            .weight(0.9)
            .enabled(false)
            .apply(&rule, later)
            .unwrap();

        assert_eq!(patched.id, RuleId(4));
        assert_eq!(patched.weight, 0.9);
        assert!(!patched.enabled);
        assert_eq!(patched.threshold, 0.5);
        assert_eq!(patched.created_at, now);
        assert_eq!(patched.updated_at, later);
    }

    #[test]
    fn test_patch_rejects_invalid() {
        let rule = draft().into_rule(RuleId(1), Utc::now()).unwrap();
        assert!(RulePatch::new().threshold(-0.2).apply(&rule, Utc::now()).is_err());
        assert!(RulePatch::new().weight(f64::INFINITY).apply(&rule, Utc::now()).is_err());
        assert!(RulePatch::new().kinds(Vec::<SignalKind>::new()).apply(&rule, Utc::now()).is_err());
    }

    #[test]
    fn test_new_rule_from_json() {
        let rule: NewRule = serde_json::from_str(
            r#"{"name":"Urgency","kinds":["urgency_language"],"weight":0.3,"threshold":0.4}"#,
        )
        .unwrap();
        assert!(rule.enabled);
        assert!(rule.id.is_none());
        assert!(rule.applicable_kinds.contains(&SignalKind::UrgencyLanguage));
    }
}
