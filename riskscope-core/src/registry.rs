//! Rule Registry - the one shared mutable resource of the scoring core
//!
//! Rules live in an immutable [`RuleSet`] behind an `Arc`:
//! - Readers clone the `Arc` and score against that snapshot
//! - Writers build a new rule set and swap it in under the write lock
//! - A reader never observes a half-applied update

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{NewRule, RiskError, Rule, RuleId, RulePatch, RulesConfig};

/// Immutable, ordered snapshot of registered rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// All rules in insertion order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Enabled rules in insertion order
    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn position(&self, id: RuleId) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    fn next_id(&self) -> RuleId {
        RuleId(self.rules.iter().map(|r| r.id.0).max().unwrap_or(0) + 1)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Registry of scoring rules
#[derive(Debug, Default)]
pub struct RuleRegistry {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from loaded configuration
    pub fn from_config(config: RulesConfig) -> Result<Self, RiskError> {
        let registry = Self::new();
        for rule in config.rules {
            registry.add(rule)?;
        }
        Ok(registry)
    }

    /// Consistent read of the current rule set
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.read().clone()
    }

    /// All rules in insertion order
    pub fn list_rules(&self) -> Vec<Rule> {
        self.snapshot().rules().to_vec()
    }

    /// Enabled rules in insertion order
    pub fn enabled_rules(&self) -> Vec<Rule> {
        self.snapshot().enabled().cloned().collect()
    }

    pub fn get(&self, id: RuleId) -> Result<Rule, RiskError> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or(RiskError::NotFound(id))
    }

    /// Register a rule, returning its id
    pub fn add(&self, rule: NewRule) -> Result<RuleId, RiskError> {
        let mut current = self.current.write();

        let id = match rule.id {
            Some(id) if current.get(id).is_some() => {
                warn!("Rejected rule '{}': duplicate id {}", rule.name, id);
                return Err(RiskError::validation(format!("rule id {} already registered", id)));
            }
            Some(id) => id,
            None => current.next_id(),
        };

        let rule = rule.into_rule(id, Utc::now()).inspect_err(|e| {
            warn!("Rejected rule: {}", e);
        })?;

        info!("Registered rule {} '{}' (weight {}, threshold {})", id, rule.name, rule.weight, rule.threshold);

        let mut rules = current.rules.clone();
        rules.push(rule);
        *current = Arc::new(RuleSet::new(rules));
        Ok(id)
    }

    /// Enable or disable a rule
    pub fn set_enabled(&self, id: RuleId, enabled: bool) -> Result<(), RiskError> {
        self.update(id, RulePatch::new().enabled(enabled)).map(|rule| {
            info!("Rule {} '{}' {}", id, rule.name, if enabled { "enabled" } else { "disabled" });
        })
    }

    /// Apply a partial update; the registry is unchanged if the result is invalid
    pub fn update(&self, id: RuleId, patch: RulePatch) -> Result<Rule, RiskError> {
        let mut current = self.current.write();

        let idx = current.position(id).ok_or(RiskError::NotFound(id))?;
        let patched = patch.apply(&current.rules[idx], Utc::now()).inspect_err(|e| {
            warn!("Rejected update of rule {}: {}", id, e);
        })?;

        let mut rules = current.rules.clone();
        rules[idx] = patched.clone();
        *current = Arc::new(RuleSet::new(rules));

        info!("Updated rule {} '{}'", id, patched.name);
        Ok(patched)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
