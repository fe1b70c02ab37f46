//! Fraud Detector
//!
//! Maps fields of a transaction payload onto fraud signals.
//! - Consumes: a flat JSON object (validated into typed attributes)
//! - Emits: one signal per configured field mapping that is present

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use riskscope_core::{Attributes, RiskError, Scalar, Signal, SignalKind};

use crate::Detector;

/// How one payload field becomes a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: String,
    pub kind: SignalKind,
    /// Value at which the signal reaches full strength
    pub scale: f64,
    /// Small values are risky (e.g. account age)
    #[serde(default)]
    pub inverse: bool,
}

impl FieldMapping {
    pub fn new(field: &str, kind: SignalKind, scale: f64) -> Self {
        Self {
            field: field.to_string(),
            kind,
            scale,
            inverse: false,
        }
    }

    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }

    fn strength(&self, value: f64) -> f64 {
        let ratio = (value / self.scale).clamp(0.0, 1.0);
        if self.inverse {
            1.0 - ratio
        } else {
            ratio
        }
    }
}

/// Fraud detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDetectorConfig {
    pub mappings: Vec<FieldMapping>,
}

impl Default for FraudDetectorConfig {
    fn default() -> Self {
        Self {
            mappings: vec![
                FieldMapping::new("amount", SignalKind::AmountAnomaly, 10_000.0),
                FieldMapping::new("transactions_last_hour", SignalKind::VelocityAnomaly, 20.0),
                FieldMapping::new("location_mismatch", SignalKind::LocationMismatch, 1.0),
                FieldMapping::new("account_age_days", SignalKind::NewAccount, 30.0).inverse(),
            ],
        }
    }
}

/// Convert a JSON object into typed attributes.
///
/// Nulls are dropped; nested arrays and objects are rejected.
pub fn attributes_from_json(value: &Value) -> Result<Attributes, RiskError> {
    let Value::Object(map) = value else {
        return Err(RiskError::validation("source data must be a JSON object"));
    };

    let mut attributes = Attributes::new();
    for (key, value) in map {
        let scalar = match value {
            Value::Null => continue,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().ok_or_else(|| {
                    RiskError::validation(format!("field '{}' is not a representable number", key))
                })?),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(RiskError::validation(format!(
                    "field '{}' must be a scalar, found a nested value",
                    key
                )));
            }
        };
        attributes.insert(key.clone(), scalar);
    }

    Ok(attributes)
}

/// Fraud detector - turns transaction fields into weighted evidence
pub struct FraudDetector {
    config: FraudDetectorConfig,
}

impl FraudDetector {
    pub fn new(config: FraudDetectorConfig) -> Result<Self, RiskError> {
        for mapping in &config.mappings {
            if !mapping.scale.is_finite() || mapping.scale <= 0.0 {
                return Err(RiskError::validation(format!(
                    "mapping for '{}' needs a positive scale, got {}",
                    mapping.field, mapping.scale
                )));
            }
        }
        Ok(Self { config })
    }

    /// Signals from already-typed attributes
    pub fn detect_attributes(&self, attributes: &Attributes) -> Result<Vec<Signal>, RiskError> {
        let mut signals = Vec::new();

        for mapping in &self.config.mappings {
            let Some(value) = attributes.get(&mapping.field) else {
                continue;
            };

            let numeric = match value {
                Scalar::Text(text) => text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| {
                        warn!("Fraud field '{}' is not a finite number: {}", mapping.field, text);
                        RiskError::validation(format!("field '{}' must be a finite number", mapping.field))
                    })?,
                other => other.as_f64().unwrap_or(0.0),
            };

            let strength = mapping.strength(numeric);
            if strength <= 0.0 {
                continue;
            }

            signals.push(
                Signal::builder(mapping.kind)
                    .strength(strength)
                    .source(self.name())
                    .attribute("field", mapping.field.as_str())
                    .attribute("value", value.clone())
                    .build()?,
            );
        }

        debug!("Fraud check: {} fields, {} signals", attributes.len(), signals.len());
        Ok(signals)
    }
}

impl Default for FraudDetector {
    fn default() -> Self {
        Self {
            config: FraudDetectorConfig::default(),
        }
    }
}

impl Detector for FraudDetector {
    type Input = Value;

    fn name(&self) -> &str {
        "fraud_check"
    }

    fn detect(&self, input: &Value) -> Result<Vec<Signal>, RiskError> {
        let attributes = attributes_from_json(input)?;
        self.detect_attributes(&attributes)
    }
}
