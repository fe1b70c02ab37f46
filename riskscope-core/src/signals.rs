//! Evidence signals emitted by detectors
//!
//! A signal is one piece of evidence:
//! - A recognized kind tag
//! - A normalized strength in [0, 1]
//! - A free-text source and the time it was observed
//!
//! Construction is the only validation boundary. Everything downstream of a
//! built [`Signal`] trusts its kind and strength.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{RiskError, MAX_STRENGTH, MIN_STRENGTH};

/// Recognized signal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    // Face analysis
    FaceNotDetected,
    FaceConfidence,
    FaceLowConfidence,
    MultipleFaces,

    // Fraud heuristics
    AmountAnomaly,
    VelocityAnomaly,
    LocationMismatch,
    NewAccount,

    // Phishing indicators
    SuspiciousLink,
    LinkDomainMismatch,
    SpoofedDomain,
    SensitiveInfoRequest,
    SuspiciousAttachment,
    ImpersonationAttempt,
    UrgencyLanguage,
    GrammarErrors,
}

impl SignalKind {
    pub const ALL: [SignalKind; 16] = [
        SignalKind::FaceNotDetected,
        SignalKind::FaceConfidence,
        SignalKind::FaceLowConfidence,
        SignalKind::MultipleFaces,
        SignalKind::AmountAnomaly,
        SignalKind::VelocityAnomaly,
        SignalKind::LocationMismatch,
        SignalKind::NewAccount,
        SignalKind::SuspiciousLink,
        SignalKind::LinkDomainMismatch,
        SignalKind::SpoofedDomain,
        SignalKind::SensitiveInfoRequest,
        SignalKind::SuspiciousAttachment,
        SignalKind::ImpersonationAttempt,
        SignalKind::UrgencyLanguage,
        SignalKind::GrammarErrors,
    ];

    /// Wire name (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::FaceNotDetected => "face_not_detected",
            SignalKind::FaceConfidence => "face_confidence",
            SignalKind::FaceLowConfidence => "face_low_confidence",
            SignalKind::MultipleFaces => "multiple_faces",
            SignalKind::AmountAnomaly => "amount_anomaly",
            SignalKind::VelocityAnomaly => "velocity_anomaly",
            SignalKind::LocationMismatch => "location_mismatch",
            SignalKind::NewAccount => "new_account",
            SignalKind::SuspiciousLink => "suspicious_link",
            SignalKind::LinkDomainMismatch => "link_domain_mismatch",
            SignalKind::SpoofedDomain => "spoofed_domain",
            SignalKind::SensitiveInfoRequest => "sensitive_info_request",
            SignalKind::SuspiciousAttachment => "suspicious_attachment",
            SignalKind::ImpersonationAttempt => "impersonation_attempt",
            SignalKind::UrgencyLanguage => "urgency_language",
            SignalKind::GrammarErrors => "grammar_errors",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        SignalKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| RiskError::validation(format!("unknown signal kind '{}'", name)))
    }
}

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view; booleans map to 1.0 / 0.0, text has none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Typed string -> scalar mapping attached to signals
pub type Attributes = BTreeMap<String, Scalar>;

/// One piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignal")]
pub struct Signal {
    kind: SignalKind,
    strength: f64,
    source: String,
    occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: Attributes,
}

impl Signal {
    /// Create a new signal builder
    pub fn builder(kind: SignalKind) -> SignalBuilder {
        SignalBuilder::new(kind)
    }

    /// Shorthand for a signal observed now
    pub fn new(kind: SignalKind, strength: f64, source: &str) -> Result<Self, RiskError> {
        Self::builder(kind).strength(strength).source(source).build()
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Scalar> {
        self.attributes.get(key)
    }
}

fn validate_strength(strength: f64) -> Result<f64, RiskError> {
    if strength.is_finite() && (MIN_STRENGTH..=MAX_STRENGTH).contains(&strength) {
        Ok(strength)
    } else {
        Err(RiskError::validation(format!(
            "signal strength {} outside [0, 1]",
            strength
        )))
    }
}

/// Unvalidated wire form; every deserialized signal goes through the builder
#[derive(Deserialize)]
struct RawSignal {
    kind: String,
    strength: f64,
    #[serde(default)]
    source: String,
    #[serde(default = "Utc::now")]
    occurred_at: DateTime<Utc>,
    #[serde(default)]
    attributes: Attributes,
}

impl TryFrom<RawSignal> for Signal {
    type Error = RiskError;

    fn try_from(raw: RawSignal) -> Result<Self, Self::Error> {
        let kind = raw.kind.parse::<SignalKind>()?;
        let mut builder = Signal::builder(kind)
            .strength(raw.strength)
            .source(&raw.source)
            .occurred_at(raw.occurred_at);
        builder.attributes = raw.attributes;
        builder.build()
    }
}

/// Builder for signals
pub struct SignalBuilder {
    kind: SignalKind,
    strength: f64,
    source: String,
    occurred_at: Option<DateTime<Utc>>,
    attributes: Attributes,
}

impl SignalBuilder {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            strength: 1.0,
            source: String::new(),
            occurred_at: None,
            attributes: Attributes::new(),
        }
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn attribute(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Validate and build; fails if strength is not a finite value in [0, 1]
    pub fn build(self) -> Result<Signal, RiskError> {
        let strength = validate_strength(self.strength)?;

        Ok(Signal {
            kind: self.kind,
            strength,
            source: self.source,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_creation() {
        let signal = Signal::builder(SignalKind::UrgencyLanguage)
            .strength(0.7)
            .source("phishing:alerts@bank.example")
            .attribute("phrase", "act now")
            .build()
            .unwrap();

        assert_eq!(signal.kind(), SignalKind::UrgencyLanguage);
        assert_eq!(signal.strength(), 0.7);
        assert_eq!(signal.attribute("phrase"), Some(&Scalar::from("act now")));
    }

    #[test]
    fn test_strength_out_of_range() {
        assert!(Signal::new(SignalKind::SuspiciousLink, 1.2, "t").is_err());
        assert!(Signal::new(SignalKind::SuspiciousLink, -0.01, "t").is_err());
        assert!(Signal::new(SignalKind::SuspiciousLink, f64::NAN, "t").is_err());
        assert!(Signal::new(SignalKind::SuspiciousLink, 0.0, "t").is_ok());
        assert!(Signal::new(SignalKind::SuspiciousLink, 1.0, "t").is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        for kind in SignalKind::ALL {
            assert_eq!(kind.as_str().parse::<SignalKind>().unwrap(), kind);
        }
        let err = "quantum_vibes".parse::<SignalKind>().unwrap_err();
        assert!(matches!(err, RiskError::Validation(_)));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Signal = serde_json::from_str(
            r#"{"kind":"link_domain_mismatch","strength":0.9,"source":"mail","occurred_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok.kind(), SignalKind::LinkDomainMismatch);

        let bad_kind = serde_json::from_str::<Signal>(r#"{"kind":"nope","strength":0.5}"#);
        assert!(bad_kind.is_err());

        let bad_strength =
            serde_json::from_str::<Signal>(r#"{"kind":"grammar_errors","strength":3.0}"#);
        assert!(bad_strength.is_err());
    }

    #[test]
    fn test_serialize_shape() {
        let at = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let signal = Signal::builder(SignalKind::FaceConfidence)
            .strength(0.5)
            .source("camera")
            .occurred_at(at)
            .build()
            .unwrap();

        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["kind"], "face_confidence");
        assert_eq!(value["strength"], 0.5);
        assert_eq!(value["source"], "camera");
        assert_eq!(value["occurred_at"], "2024-05-01T10:00:00Z");
        assert!(value.get("attributes").is_none());
    }
}
