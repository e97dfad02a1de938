//! Cold training of a vectorizer + classifier pair.

use std::sync::Arc;

use crate::analysis::cleaner::{AnalyzerCleaner, TextCleaner};
use crate::config::{AugurConfig, ClassifierConfig, FeatureConfig};
use crate::corpus::{TrainingCorpus, TrainingExample};
use crate::error::{AugurError, Result};
use crate::ml::artifacts::{ArtifactSet, ArtifactWriteGuard};
use crate::ml::classifier::IntentClassifier;
use crate::ml::features::FeatureEngineer;

/// Fits fresh models from labelled examples.
#[derive(Clone)]
pub struct ModelTrainer {
    features: FeatureConfig,
    classifier: ClassifierConfig,
    cleaner: Arc<dyn TextCleaner>,
}

impl std::fmt::Debug for ModelTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTrainer")
            .field("features", &self.features)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl ModelTrainer {
    pub fn new(
        features: FeatureConfig,
        classifier: ClassifierConfig,
        cleaner: Arc<dyn TextCleaner>,
    ) -> Self {
        Self {
            features,
            classifier,
            cleaner,
        }
    }

    /// Trainer using the configured model settings and the default cleaner.
    pub fn from_config(config: &AugurConfig) -> Result<Self> {
        Ok(Self::new(
            config.features.clone(),
            config.classifier.clone(),
            Arc::new(AnalyzerCleaner::simple()?),
        ))
    }

    pub fn cleaner(&self) -> Arc<dyn TextCleaner> {
        self.cleaner.clone()
    }

    /// Cleaned texts and their labels.
    pub fn prepare(&self, examples: &[TrainingExample]) -> (Vec<String>, Vec<String>) {
        examples
            .iter()
            .map(|e| (self.cleaner.clean(&e.text), e.intent.clone()))
            .unzip()
    }

    /// Fit a new vectorizer and classifier from scratch.
    pub fn train_examples(&self, examples: &[TrainingExample]) -> Result<TrainedModel> {
        if examples.is_empty() {
            return Err(AugurError::InsufficientTrainingData {
                min_samples: 1,
                actual: 0,
            });
        }
        let (texts, labels) = self.prepare(examples);

        let mut features = FeatureEngineer::new(self.features.clone())?;
        let vectors = features.fit_transform(&texts)?;

        let mut classifier = IntentClassifier::new(self.classifier.clone());
        classifier.train(&vectors, &labels)?;
        if let Some(fingerprint) = features.fingerprint() {
            classifier.bind_vectorizer(fingerprint)?;
        }

        log::info!(
            "Trained on {} samples with {} intents",
            labels.len(),
            classifier.intent_classes().len()
        );
        Ok(TrainedModel {
            features,
            classifier,
            samples_count: labels.len(),
        })
    }

    pub fn train(&self, corpus: &TrainingCorpus) -> Result<TrainedModel> {
        self.train_examples(&corpus.examples())
    }
}

/// A freshly fitted vectorizer and classifier.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub features: FeatureEngineer,
    pub classifier: IntentClassifier,
    /// Number of examples the pair was fitted on.
    pub samples_count: usize,
}

impl TrainedModel {
    /// Write all three artifacts while holding the set exclusively.
    pub fn publish(&self, artifacts: &ArtifactSet) -> Result<()> {
        let guard = artifacts.lock_exclusive()?;
        self.write_to(&guard)
    }

    /// Write all three artifacts under a lock the caller already holds.
    pub fn write_to(&self, guard: &ArtifactWriteGuard<'_>) -> Result<()> {
        let paths = guard.paths();
        self.features.persist(&paths.vectorizer)?;
        self.classifier.persist(&paths.model, &paths.label_encoder)?;
        log::info!("Published model artifacts to {}", paths.model.display());
        Ok(())
    }

    /// Accuracy on `examples`, cleaned with `cleaner`; 0.0 on failure.
    pub fn score(&self, cleaner: &dyn TextCleaner, examples: &[TrainingExample]) -> f64 {
        let texts: Vec<String> = examples.iter().map(|e| cleaner.clean(&e.text)).collect();
        let labels: Vec<&str> = examples.iter().map(|e| e.intent.as_str()).collect();
        match self.features.transform(&texts) {
            Ok(vectors) => self.classifier.score(&vectors, &labels),
            Err(e) => {
                log::warn!("Scoring failed: {e}");
                0.0
            }
        }
    }
}
