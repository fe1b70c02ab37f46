//! Common traits for detector adapters

use riskscope_core::{RiskError, Signal};

/// Common interface for all detector adapters
pub trait Detector: Send + Sync {
    /// Raw observation this detector consumes
    type Input: ?Sized;

    /// Detector name, used as the signal source prefix
    fn name(&self) -> &str;

    /// Derive signals from one observation
    fn detect(&self, input: &Self::Input) -> Result<Vec<Signal>, RiskError>;
}

/// Strength for `hits` occurrences, reaching 1.0 at `saturation` hits
pub fn saturating_strength(hits: usize, saturation: usize) -> f64 {
    if saturation == 0 {
        return if hits > 0 { 1.0 } else { 0.0 };
    }
    (hits as f64 / saturation as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_strength() {
        assert_eq!(saturating_strength(0, 3), 0.0);
        assert!((saturating_strength(1, 3) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(saturating_strength(3, 3), 1.0);
        assert_eq!(saturating_strength(7, 3), 1.0);
        assert_eq!(saturating_strength(1, 0), 1.0);
    }
}
