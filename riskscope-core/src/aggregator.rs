//! Aggregator - combines firing rules into a bounded score
//!
//! For each enabled rule, in registry order:
//! - Take the strongest signal whose kind the rule applies to
//! - The rule fires if that strength reaches the rule's threshold
//! - A firing rule contributes `weight * strength`
//!
//! The score is the sum of contributions, saturated at 1.0.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::{Contribution, RuleRegistry, RuleSet, Signal, Verdict, MAX_STRENGTH};

/// Scores signal sets against the registry's current rules
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<RuleRegistry>,
}

impl Aggregator {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Score signals against a snapshot taken now
    pub fn score(&self, signals: &[Signal]) -> Verdict {
        self.score_at(signals, Utc::now())
    }

    /// Score with an explicit verdict timestamp
    pub fn score_at(&self, signals: &[Signal], computed_at: DateTime<Utc>) -> Verdict {
        let snapshot = self.registry.snapshot();
        score_snapshot(&snapshot, signals, computed_at)
    }
}

/// Pure scoring of `signals` against one rule set
pub fn score_snapshot(rules: &RuleSet, signals: &[Signal], computed_at: DateTime<Utc>) -> Verdict {
    let mut contributions = Vec::new();

    for rule in rules.enabled() {
        let strongest = signals
            .iter()
            .filter(|s| rule.applies_to(s.kind()))
            .map(|s| s.strength())
            .fold(None, |max: Option<f64>, s| Some(max.map_or(s, |m| m.max(s))));

        let Some(strength) = strongest else {
            continue;
        };

        if strength >= rule.threshold {
            let contribution = rule.weight * strength;
            debug!(
                "Rule {} '{}' fired: strength {:.3} x weight {:.3} = {:.3}",
                rule.id, rule.name, strength, rule.weight, contribution
            );
            contributions.push(Contribution {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                strength,
                contribution,
            });
        }
    }

    let raw: f64 = contributions.iter().map(|c| c.contribution).sum();
    let verdict = Verdict::new(raw.min(MAX_STRENGTH), contributions, signals.to_vec(), computed_at);

    debug!(
        "Verdict: score {:.3} ({}) from {} signals, {} rules fired",
        verdict.score(),
        verdict.tier(),
        signals.len(),
        verdict.matched_rules().len()
    );

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewRule, RiskTier, RuleId, SignalKind};

    fn signal(kind: SignalKind, strength: f64) -> Signal {
        Signal::new(kind, strength, "test").unwrap()
    }

    fn aggregator(rules: Vec<NewRule>) -> Aggregator {
        let registry = RuleRegistry::new();
        for rule in rules {
            registry.add(rule).unwrap();
        }
        Aggregator::new(Arc::new(registry))
    }

    fn mismatch_rule() -> NewRule {
        NewRule::new("Mismatched URLs", [SignalKind::LinkDomainMismatch], 0.6, 0.5)
    }

    #[test]
    fn test_single_rule_fires() {
        let agg = aggregator(vec![mismatch_rule()]);
        let verdict = agg.score(&[signal(SignalKind::LinkDomainMismatch, 0.9)]);

        assert!((verdict.score() - 0.54).abs() < 1e-9);
        assert_eq!(verdict.tier(), RiskTier::Medium);
        assert_eq!(verdict.matched_rules(), &[RuleId(1)]);
        assert_eq!(verdict.contributions()[0].strength, 0.9);
    }

    #[test]
    fn test_below_threshold() {
        let agg = aggregator(vec![mismatch_rule()]);
        let verdict = agg.score(&[signal(SignalKind::LinkDomainMismatch, 0.3)]);

        assert_eq!(verdict.score(), 0.0);
        assert_eq!(verdict.tier(), RiskTier::VeryLow);
        assert!(verdict.matched_rules().is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let agg = aggregator(vec![mismatch_rule()]);
        let verdict = agg.score(&[signal(SignalKind::LinkDomainMismatch, 0.5)]);
        assert_eq!(verdict.matched_rules(), &[RuleId(1)]);
        assert!((verdict.score() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_saturates_at_one() {
        let agg = aggregator(vec![
            NewRule::new("a", [SignalKind::SuspiciousLink], 0.5, 0.4),
            NewRule::new("b", [SignalKind::SuspiciousLink], 0.5, 0.4),
            NewRule::new("c", [SignalKind::SuspiciousLink], 0.5, 0.4),
        ]);
        let verdict = agg.score(&[signal(SignalKind::SuspiciousLink, 1.0)]);

        assert_eq!(verdict.score(), 1.0);
        assert_eq!(verdict.tier(), RiskTier::High);
        assert_eq!(verdict.matched_rules(), &[RuleId(1), RuleId(2), RuleId(3)]);
    }

    #[test]
    fn test_two_equal_rules_sum_to_one() {
        let agg = aggregator(vec![
            NewRule::new("a", [SignalKind::UrgencyLanguage], 0.5, 0.4),
            NewRule::new("b", [SignalKind::UrgencyLanguage], 0.5, 0.4),
        ]);
        let verdict = agg.score(&[signal(SignalKind::UrgencyLanguage, 1.0)]);
        assert_eq!(verdict.score(), 1.0);
        assert_eq!(verdict.tier(), RiskTier::High);
        assert_eq!(verdict.matched_rules(), &[RuleId(1), RuleId(2)]);
    }

    #[test]
    fn test_uses_strongest_matching_signal() {
        let agg = aggregator(vec![NewRule::new(
            "links",
            [SignalKind::SuspiciousLink, SignalKind::LinkDomainMismatch],
            0.5,
            0.5,
        )]);
        let verdict = agg.score(&[
            signal(SignalKind::SuspiciousLink, 0.2),
            signal(SignalKind::LinkDomainMismatch, 0.8),
            signal(SignalKind::UrgencyLanguage, 1.0),
        ]);
        assert!((verdict.score() - 0.4).abs() < 1e-9);
        assert_eq!(verdict.contributions()[0].strength, 0.8);
    }

    #[test]
    fn test_empty_signals() {
        let agg = aggregator(vec![mismatch_rule()]);
        let verdict = agg.score(&[]);
        assert_eq!(verdict.score(), 0.0);
        assert_eq!(verdict.tier(), RiskTier::VeryLow);
        assert!(verdict.matched_rules().is_empty());
        assert!(verdict.signals().is_empty());
    }

    #[test]
    fn test_no_enabled_rules() {
        let agg = aggregator(vec![mismatch_rule().disabled()]);
        let verdict = agg.score(&[signal(SignalKind::LinkDomainMismatch, 1.0)]);
        assert_eq!(verdict.score(), 0.0);
        assert!(verdict.matched_rules().is_empty());
    }

    #[test]
    fn test_disable_removes_rule_and_never_increases_score() {
        let agg = aggregator(vec![
            mismatch_rule(),
            NewRule::new("Urgency", [SignalKind::UrgencyLanguage], 0.3, 0.4),
        ]);
        let signals = [
            signal(SignalKind::LinkDomainMismatch, 0.9),
            signal(SignalKind::UrgencyLanguage, 0.7),
        ];

        let before = agg.score(&signals);
        assert!(before.fired(RuleId(1)));

        agg.registry().set_enabled(RuleId(1), false).unwrap();
        let after = agg.score(&signals);

        assert!(!after.fired(RuleId(1)));
        assert!(after.score() <= before.score());
        assert_eq!(after.matched_rules(), &[RuleId(2)]);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let agg = aggregator(vec![
            mismatch_rule(),
            NewRule::new("Urgency", [SignalKind::UrgencyLanguage], 0.3, 0.4),
        ]);
        let signals = [
            signal(SignalKind::UrgencyLanguage, 0.7),
            signal(SignalKind::LinkDomainMismatch, 0.9),
        ];

        let a = agg.score(&signals);
        let b = agg.score(&signals);

        assert_eq!(a.score().to_bits(), b.score().to_bits());
        assert_eq!(a.tier(), b.tier());
        assert_eq!(a.matched_rules(), b.matched_rules());
        assert_eq!(a.signals(), b.signals());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_matched_rules_follow_registry_order() {
        let agg = aggregator(vec![
            NewRule::new("late", [SignalKind::GrammarErrors], 0.1, 0.1).with_id(9),
            NewRule::new("early", [SignalKind::GrammarErrors], 0.1, 0.1).with_id(3),
        ]);
        let verdict = agg.score(&[signal(SignalKind::GrammarErrors, 0.5)]);
        assert_eq!(verdict.matched_rules(), &[RuleId(9), RuleId(3)]);
    }

    #[test]
    fn test_signals_are_copied() {
        let agg = aggregator(vec![mismatch_rule()]);
        let mut signals = vec![signal(SignalKind::LinkDomainMismatch, 0.9)];
        let verdict = agg.score(&signals);
        signals.clear();
        assert_eq!(verdict.signals().len(), 1);
    }

    #[test]
    fn test_score_bounds_and_tier_over_grid() {
        let agg = aggregator(vec![
            NewRule::new("a", [SignalKind::AmountAnomaly], 0.7, 0.2),
            NewRule::new("b", [SignalKind::VelocityAnomaly], 0.4, 0.5),
            NewRule::new("c", [SignalKind::AmountAnomaly, SignalKind::NewAccount], 0.9, 0.0),
        ]);

        for i in 0..=10 {
            for j in 0..=10 {
                let signals = [
                    signal(SignalKind::AmountAnomaly, i as f64 / 10.0),
                    signal(SignalKind::VelocityAnomaly, j as f64 / 10.0),
                ];
                let verdict = agg.score(&signals);
                assert!((0.0..=1.0).contains(&verdict.score()));
                assert_eq!(verdict.tier(), RiskTier::from_score(verdict.score()));
            }
        }
    }

    #[test]
    fn test_concurrent_scoring_sees_consistent_snapshots() {
        let agg = aggregator(vec![
            NewRule::new("a", [SignalKind::SuspiciousLink], 0.3, 0.1),
            NewRule::new("b", [SignalKind::SuspiciousLink], 0.3, 0.1),
        ]);
        let signals = [signal(SignalKind::SuspiciousLink, 1.0)];

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    agg.registry().set_enabled(RuleId(1), i % 2 == 1).unwrap();
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let verdict = agg.score(&signals);
                        let matched = verdict.matched_rules();
                        assert!(matched == [RuleId(1), RuleId(2)] || matched == [RuleId(2)]);
                        let sum: f64 = verdict.contributions().iter().map(|c| c.contribution).sum();
                        assert!((verdict.score() - sum).abs() < 1e-9);
                    }
                });
            }
        });
    }
}
