//! Confidence gating between classification and response selection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};

/// Default routing threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Qualitative confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Band for `score`; boundaries at 0.9, 0.7, 0.5 and 0.3 are inclusive
    /// on the upper band.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            ConfidenceLevel::VeryHigh
        } else if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else if score >= 0.3 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "very_high",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::VeryLow => "very_low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the response layer should do with a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    UseResponse,
    UseFallback,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::UseResponse => "use_response",
            Recommendation::UseFallback => "use_fallback",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the routing threshold.
///
/// The threshold is stored as the bit pattern of an `f64` in an atomic, so a
/// checker shared between serving threads never yields a torn read.
#[derive(Debug)]
pub struct ConfidenceChecker {
    threshold: AtomicU64,
}

impl Default for ConfidenceChecker {
    fn default() -> Self {
        Self {
            threshold: AtomicU64::new(DEFAULT_THRESHOLD.to_bits()),
        }
    }
}

impl ConfidenceChecker {
    /// Checker with the given threshold, which must lie in `[0, 1]`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AugurError::invalid_config(format!(
                "threshold {threshold} must be between 0 and 1"
            )));
        }
        log::info!("Confidence threshold set to {threshold}");
        Ok(Self {
            threshold: AtomicU64::new(threshold.to_bits()),
        })
    }

    pub fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold.load(Ordering::Acquire))
    }

    fn store(&self, threshold: f64) {
        self.threshold.store(threshold.to_bits(), Ordering::Release);
    }

    /// Update the threshold.
    ///
    /// Values outside `[0, 1]` (and NaN) are logged and ignored; the previous
    /// threshold stays in effect. Returns whether the value was applied.
    pub fn set_threshold(&self, threshold: f64) -> bool {
        if (0.0..=1.0).contains(&threshold) {
            self.store(threshold);
            log::info!("Threshold updated to {threshold}");
            true
        } else {
            log::warn!(
                "Invalid threshold {threshold}, must be between 0 and 1; keeping {}",
                self.threshold()
            );
            false
        }
    }

    pub fn is_confident(&self, score: f64) -> bool {
        score >= self.threshold()
    }

    pub fn level(&self, score: f64) -> ConfidenceLevel {
        ConfidenceLevel::from_score(score)
    }

    pub fn recommend(&self, score: f64) -> Recommendation {
        if self.is_confident(score) {
            Recommendation::UseResponse
        } else {
            Recommendation::UseFallback
        }
    }

    /// Whether the score clears the threshold, and its band.
    pub fn evaluate_prediction(&self, score: f64) -> (bool, ConfidenceLevel) {
        (self.is_confident(score), self.level(score))
    }

    /// Reset the threshold from a measured accuracy.
    ///
    /// | accuracy       | threshold |
    /// |----------------|-----------|
    /// | < 0.60         | 0.70      |
    /// | < 0.75         | 0.60      |
    /// | > 0.95         | 0.40      |
    /// | otherwise      | 0.50      |
    ///
    /// Checked in that order, first match wins. Returns the new threshold.
    pub fn adjust(&self, accuracy: f64) -> f64 {
        let threshold = if accuracy < 0.6 {
            0.7
        } else if accuracy < 0.75 {
            0.6
        } else if accuracy > 0.95 {
            0.4
        } else {
            0.5
        };
        self.store(threshold);
        log::info!("Threshold adjusted to {threshold} based on accuracy {accuracy:.4}");
        threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        let checker = ConfidenceChecker::default();
        assert_eq!(checker.level(0.9), ConfidenceLevel::VeryHigh);
        assert_eq!(checker.level(0.8999), ConfidenceLevel::High);
        assert_eq!(checker.level(0.7), ConfidenceLevel::High);
        assert_eq!(checker.level(0.5), ConfidenceLevel::Medium);
        assert_eq!(checker.level(0.4999), ConfidenceLevel::Low);
        assert_eq!(checker.level(0.3), ConfidenceLevel::Low);
        assert_eq!(checker.level(0.2999), ConfidenceLevel::VeryLow);
        assert_eq!(checker.level(0.0).as_str(), "very_low");
    }

    #[test]
    fn test_set_threshold_validation() {
        let checker = ConfidenceChecker::default();
        assert!(!checker.set_threshold(1.5));
        assert_eq!(checker.threshold(), 0.5);
        assert!(!checker.set_threshold(f64::NAN));
        assert_eq!(checker.threshold(), 0.5);
        assert!(checker.set_threshold(0.3));
        assert_eq!(checker.threshold(), 0.3);

        assert!(ConfidenceChecker::new(-0.1).is_err());
    }

    #[test]
    fn test_recommendation_gate() {
        let checker = ConfidenceChecker::default();
        assert_eq!(checker.recommend(0.5), Recommendation::UseResponse);
        assert_eq!(checker.recommend(0.4999), Recommendation::UseFallback);
        assert_eq!(checker.recommend(0.5).to_string(), "use_response");
        assert_eq!(
            checker.evaluate_prediction(0.95),
            (true, ConfidenceLevel::VeryHigh)
        );
    }

    #[test]
    fn test_adjust_is_a_reset() {
        let checker = ConfidenceChecker::default();
        assert_eq!(checker.adjust(0.5), 0.7);
        assert_eq!(checker.adjust(0.6), 0.6);
        assert_eq!(checker.adjust(0.75), 0.5);
        assert_eq!(checker.adjust(0.95), 0.5);
        assert_eq!(checker.adjust(0.96), 0.4);
        assert_eq!(checker.threshold(), 0.4);
    }

    #[test]
    fn test_level_serializes_snake_case() {
        let json = serde_json::to_string(&ConfidenceLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"very_high\"");
    }
}
