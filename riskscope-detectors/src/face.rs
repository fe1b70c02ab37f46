//! Face Detector
//!
//! Turns face-detector output for one photo into signals.
//! - Consumes: detected face boxes (image decoding happens upstream)
//! - Emits: face_not_detected, face_confidence, face_low_confidence, multiple_faces

use serde::{Deserialize, Serialize};
use tracing::debug;

use riskscope_core::{RiskError, Signal, SignalKind};

use crate::Detector;

/// One detected face region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detector confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Detector output for one photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub faces: Vec<FaceBox>,
    /// Mean brightness (0 - 255) of the largest face region, if measured
    #[serde(default)]
    pub mean_brightness: Option<f64>,
}

impl FaceObservation {
    /// The largest face is taken as the photo's subject
    pub fn largest_face(&self) -> Option<&FaceBox> {
        self.faces.iter().max_by_key(|f| f.area())
    }
}

/// Face detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetectorConfig {
    /// Confidences from the high-accuracy model are used as reported
    pub use_high_accuracy_model: bool,
    /// Confidence below which face_low_confidence is emitted
    pub min_confidence: f64,
    /// Multiplier applied to confidences from the fast model
    pub fast_model_discount: f64,
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            use_high_accuracy_model: true,
            min_confidence: 0.5,
            fast_model_discount: 0.9,
        }
    }
}

/// Rough age estimate from face-region brightness (0 - 255).
///
/// A placeholder heuristic, attached to signals as an attribute only.
pub fn estimate_age(mean_brightness: f64) -> u32 {
    let brightness = mean_brightness.clamp(0.0, 255.0);
    (25.0 + (brightness / 255.0) * 30.0) as u32
}

/// Face detector - emits confidence signals for the photo's subject
pub struct FaceDetector {
    config: FaceDetectorConfig,
}

impl FaceDetector {
    pub fn new(config: FaceDetectorConfig) -> Result<Self, RiskError> {
        if !config.min_confidence.is_finite() || !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(RiskError::validation(format!(
                "min_confidence {} outside [0, 1]",
                config.min_confidence
            )));
        }
        if !config.fast_model_discount.is_finite() || config.fast_model_discount <= 0.0 {
            return Err(RiskError::validation(format!(
                "fast_model_discount must be positive, got {}",
                config.fast_model_discount
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &FaceDetectorConfig {
        &self.config
    }

    fn effective_confidence(&self, reported: f64) -> f64 {
        if self.config.use_high_accuracy_model {
            reported
        } else {
            (reported * self.config.fast_model_discount).clamp(0.0, 1.0)
        }
    }
}

impl Default for FaceDetector {
    fn default() -> Self {
        Self {
            config: FaceDetectorConfig::default(),
        }
    }
}

impl Detector for FaceDetector {
    type Input = FaceObservation;

    fn name(&self) -> &str {
        "face_analysis"
    }

    fn detect(&self, input: &FaceObservation) -> Result<Vec<Signal>, RiskError> {
        let Some(face) = input.largest_face() else {
            debug!("No faces detected");
            return Ok(vec![Signal::builder(SignalKind::FaceNotDetected)
                .strength(1.0)
                .source(self.name())
                .build()?]);
        };

        if !(0.0..=1.0).contains(&face.confidence) {
            return Err(RiskError::validation(format!(
                "face confidence {} outside [0, 1]",
                face.confidence
            )));
        }

        let confidence = self.effective_confidence(face.confidence);
        let face_count = input.faces.len();
        let mut signals = Vec::new();

        let mut primary = Signal::builder(SignalKind::FaceConfidence)
            .strength(confidence)
            .source(self.name())
            .attribute("face_count", face_count as i64)
            .attribute("high_accuracy_model", self.config.use_high_accuracy_model);
        if let Some(brightness) = input.mean_brightness {
            primary = primary.attribute("age_estimate", estimate_age(brightness) as i64);
        }
        signals.push(primary.build()?);

        if confidence < self.config.min_confidence {
            signals.push(
                Signal::builder(SignalKind::FaceLowConfidence)
                    .strength(1.0 - confidence)
                    .source(self.name())
                    .attribute("confidence", confidence)
                    .build()?,
            );
        }

        if face_count > 1 {
            signals.push(
                Signal::builder(SignalKind::MultipleFaces)
                    .strength(1.0 - 1.0 / face_count as f64)
                    .source(self.name())
                    .attribute("face_count", face_count as i64)
                    .build()?,
            );
        }

        debug!("Face analysis: {} faces, confidence {:.2}, {} signals", face_count, confidence, signals.len());
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskscope_core::Scalar;

    fn face(width: u32, confidence: f64) -> FaceBox {
        FaceBox { x: 0, y: 0, width, height: width, confidence }
    }

    #[test]
    fn test_no_face() {
        let signals = FaceDetector::default().detect(&FaceObservation::default()).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind(), SignalKind::FaceNotDetected);
        assert_eq!(signals[0].strength(), 1.0);
    }

    #[test]
    fn test_confident_single_face() {
        let observation = FaceObservation {
            faces: vec![face(120, 0.92)],
            mean_brightness: Some(255.0),
        };
        let signals = FaceDetector::default().detect(&observation).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind(), SignalKind::FaceConfidence);
        assert_eq!(signals[0].strength(), 0.92);
        assert_eq!(signals[0].attribute("age_estimate"), Some(&Scalar::Int(55)));
    }

    #[test]
    fn test_low_confidence_uses_largest_face() {
        let observation = FaceObservation {
            faces: vec![face(40, 0.95), face(200, 0.3)],
            mean_brightness: None,
        };
        let signals = FaceDetector::default().detect(&observation).unwrap();
        let kinds: Vec<_> = signals.iter().map(|s| s.kind()).collect();

        assert_eq!(
            kinds,
            vec![SignalKind::FaceConfidence, SignalKind::FaceLowConfidence, SignalKind::MultipleFaces]
        );
        assert!((signals[1].strength() - 0.7).abs() < 1e-9);
        assert_eq!(signals[2].strength(), 0.5);
    }

    #[test]
    fn test_fast_model_discount() {
        let detector = FaceDetector::new(FaceDetectorConfig {
            use_high_accuracy_model: false,
            ..Default::default()
        })
        .unwrap();
        let observation = FaceObservation { faces: vec![face(100, 0.5)], mean_brightness: None };
        let signals = detector.detect(&observation).unwrap();

        assert!((signals[0].strength() - 0.45).abs() < 1e-9);
        assert_eq!(signals[1].kind(), SignalKind::FaceLowConfidence);
    }

    #[test]
    fn test_invalid_confidence() {
        let observation = FaceObservation { faces: vec![face(100, 1.7)], mean_brightness: None };
        assert!(matches!(
            FaceDetector::default().detect(&observation),
            Err(RiskError::Validation(_))
        ));
    }

    #[test]
    fn test_estimate_age() {
        assert_eq!(estimate_age(0.0), 25);
        assert_eq!(estimate_age(255.0), 55);
        assert_eq!(estimate_age(900.0), 55);
    }

    #[test]
    fn test_bad_config_rejected() {
        let nan_discount = FaceDetectorConfig {
            fast_model_discount: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(FaceDetector::new(nan_discount), Err(RiskError::Validation(_))));

        let zero_discount = FaceDetectorConfig {
            fast_model_discount: 0.0,
            ..Default::default()
        };
        assert!(FaceDetector::new(zero_discount).is_err());

        let high_min = FaceDetectorConfig {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(FaceDetector::new(high_min).is_err());

        assert!(FaceDetector::new(FaceDetectorConfig::default()).is_ok());
    }
}
