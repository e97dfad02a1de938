//! Configuration for the learning loop.
//!
//! [`AugurConfig`] is a plain serde structure with defaults for every field,
//! so a config file only needs to name what it overrides:
//!
//! ```
//! use augur::config::AugurConfig;
//!
//! let config: AugurConfig = serde_json::from_str(r#"{ "confidence_threshold": 0.6 }"#).unwrap();
//! assert_eq!(config.confidence_threshold, 0.6);
//! assert_eq!(config.features.max_features, 1000);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};
use crate::ml::artifacts::ArtifactPaths;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugurConfig {
    /// Vectorizer settings.
    pub features: FeatureConfig,
    /// Classifier settings.
    pub classifier: ClassifierConfig,
    /// Initial confidence threshold for routing (0.0 - 1.0).
    pub confidence_threshold: f64,
    /// File locations.
    pub paths: PathsConfig,
    /// Retraining loop settings.
    pub retrain: RetrainConfig,
}

impl Default for AugurConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            classifier: ClassifierConfig::default(),
            confidence_threshold: 0.5,
            paths: PathsConfig::default(),
            retrain: RetrainConfig::default(),
        }
    }
}

impl AugurConfig {
    /// Load and validate a config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AugurError::invalid_config(format!(
                "cannot read config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: AugurConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every range constraint.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.classifier.validate()?;
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AugurError::invalid_config(format!(
                "confidence_threshold {} must be between 0 and 1",
                self.confidence_threshold
            )));
        }
        Ok(())
    }

    /// The artifact triple described by `paths`.
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.paths.model.clone(),
            vectorizer: self.paths.vectorizer.clone(),
            label_encoder: self.paths.label_encoder.clone(),
        }
    }
}

/// TF-IDF vectorizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Upper bound on vocabulary size.
    pub max_features: usize,
    /// Terms in fewer documents than this are dropped.
    pub min_df: usize,
    /// Terms in more than this proportion of documents are dropped.
    pub max_df: f64,
    /// Smallest and largest n-gram length.
    pub ngram_range: (usize, usize),
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            min_df: 1,
            max_df: 1.0,
            ngram_range: (1, 2),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(AugurError::invalid_config("max_features must be positive"));
        }
        if self.min_df == 0 {
            return Err(AugurError::invalid_config("min_df must be at least 1"));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(AugurError::invalid_config(format!(
                "max_df {} must be in (0, 1]",
                self.max_df
            )));
        }
        let (low, high) = self.ngram_range;
        if low == 0 || low > high {
            return Err(AugurError::invalid_config(format!(
                "invalid ngram_range ({low}, {high})"
            )));
        }
        Ok(())
    }
}

/// Multinomial naive Bayes settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Additive (Laplace/Lidstone) smoothing.
    pub alpha: f64,
    /// Learn class priors; uniform priors otherwise.
    pub fit_prior: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_prior: true,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0) {
            return Err(AugurError::invalid_config(format!(
                "alpha {} must be positive",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub corpus: PathBuf,
    pub model: PathBuf,
    pub vectorizer: PathBuf,
    pub label_encoder: PathBuf,
    pub history: PathBuf,
    pub evaluation_report: PathBuf,
    /// SQLite database holding low-confidence records.
    pub record_store: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("data/intents.json"),
            model: PathBuf::from("models/intent_model.bin"),
            vectorizer: PathBuf::from("models/vectorizer.bin"),
            label_encoder: PathBuf::from("models/label_encoder.bin"),
            history: PathBuf::from("logs/retraining_history.json"),
            evaluation_report: PathBuf::from("logs/model_evaluation_report.json"),
            record_store: PathBuf::from("data/augur.db"),
        }
    }
}

/// Retraining loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    /// Reset the confidence threshold from verified accuracy after each run.
    pub adaptive_threshold: bool,
    /// Number of events reported by status queries.
    pub recent_events: usize,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            adaptive_threshold: false,
            recent_events: 5,
        }
    }
}
