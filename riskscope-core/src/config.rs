//! Rule configuration loaded from TOML
//!
//! ```toml
//! [[rules]]
//! id = 9
//! name = "Mismatched URLs"
//! kinds = ["link_domain_mismatch"]
//! weight = 0.6
//! threshold = 0.5
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::{NewRule, RiskError};

const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// A rule set as written in a config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub rules: Vec<NewRule>,
}

impl RulesConfig {
    /// Parse a TOML rule set
    pub fn from_toml_str(content: &str) -> Result<Self, RiskError> {
        toml::from_str(content).map_err(|e| RiskError::Config(e.to_string()))
    }

    /// Load a TOML rule set from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RiskError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// The rule set shipped with the crate
    pub fn embedded_default() -> Result<Self, RiskError> {
        Self::from_toml_str(DEFAULT_RULES)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuleId, RuleRegistry, SignalKind};

    #[test]
    fn test_embedded_default_loads() {
        let config = RulesConfig::embedded_default().unwrap();
        assert_eq!(config.len(), 14);

        let registry = RuleRegistry::from_config(config).unwrap();
        let mismatched = registry.get(RuleId(9)).unwrap();
        assert_eq!(mismatched.name, "Mismatched URLs");
        assert!(mismatched.applies_to(SignalKind::LinkDomainMismatch));
        assert!(!registry.get(RuleId(14)).unwrap().enabled);
    }

    #[test]
    fn test_parse_minimal() {
        let config = RulesConfig::from_toml_str(
            r#"
            [[rules]]
            name = "Urgency"
            kinds = ["urgency_language"]
            weight = 0.3
            threshold = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(config.len(), 1);
        assert!(config.rules[0].enabled);
        assert!(config.rules[0].id.is_none());
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let err = RulesConfig::from_toml_str(
            r#"
            [[rules]]
            name = "Bogus"
            kinds = ["moon_phase"]
            weight = 0.3
            threshold = 0.4
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RiskError::Config(_)));
    }

    #[test]
    fn test_invalid_rule_rejected_by_registry() {
        let config = RulesConfig::from_toml_str(
            r#"
            [[rules]]
            name = "Negative"
            kinds = ["new_account"]
            weight = -0.3
            threshold = 0.4
            "#,
        )
        .unwrap();
        assert!(matches!(
            RuleRegistry::from_config(config),
            Err(RiskError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RulesConfig::load("/nonexistent/riskscope/rules.toml"),
            Err(RiskError::Io(_))
        ));
    }
}
