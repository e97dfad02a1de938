//! Model quality reports.
//!
//! [`ModelEvaluator`] scores a vectorizer/classifier pair on labelled
//! examples and bundles overall metrics, per-intent metrics and the
//! confidence distribution into an [`EvaluationReport`].
//!
//! Two convenience paths exist:
//!
//! - [`ModelEvaluator::evaluate_full`] loads the persisted artifacts and
//!   scores them against the training corpus itself. This measures how well
//!   the model fits its own training data, **not** how it generalizes; the
//!   numbers are optimistic by construction.
//! - [`ModelEvaluator::evaluate_holdout`] trains a throwaway model on a
//!   shuffled split of the corpus and scores the held-out part.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::cleaner::TextCleaner;
use crate::corpus::{TrainingCorpus, TrainingExample};
use crate::error::{AugurError, Result};
use crate::ml::artifacts::ArtifactSet;
use crate::ml::classifier::IntentClassifier;
use crate::ml::features::FeatureEngineer;
use crate::ml::metrics::{self, ConfidenceDistribution, IntentMetrics};
use crate::ml::trainer::ModelTrainer;
use crate::util::fs::write_json_atomic;

/// Headline metrics for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1_score: f64,
    pub test_samples: usize,
}

/// Snapshot written after each evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub overall_metrics: OverallMetrics,
    pub per_intent_metrics: BTreeMap<String, IntentMetrics>,
    pub confidence_distribution: ConfidenceDistribution,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationReport {
    /// Write the report, replacing any earlier snapshot at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        write_json_atomic(path, self).map_err(|e| {
            AugurError::serialization(format!("cannot write report {}: {e}", path.display()))
        })?;
        log::info!("Evaluation report saved to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Predictions and confidences for a labelled set.
struct Scored {
    labels: Vec<String>,
    predicted: Vec<String>,
    confidences: Vec<f64>,
    classes: Vec<String>,
}

/// Computes evaluation metrics.
#[derive(Clone)]
pub struct ModelEvaluator {
    cleaner: Arc<dyn TextCleaner>,
}

impl std::fmt::Debug for ModelEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEvaluator").finish_non_exhaustive()
    }
}

impl ModelEvaluator {
    /// `cleaner` must be the one the model was trained with.
    pub fn new(cleaner: Arc<dyn TextCleaner>) -> Self {
        Self { cleaner }
    }

    fn predict(classifier: &IntentClassifier, features: &[Vec<f64>]) -> Result<Vec<String>> {
        if !classifier.is_trained() {
            return Err(AugurError::not_trained("cannot evaluate an untrained model"));
        }
        classifier.predict(features)
    }

    /// Accuracy and weighted precision/recall/F1.
    pub fn evaluate_model<S: AsRef<str>>(
        &self,
        classifier: &IntentClassifier,
        features: &[Vec<f64>],
        labels: &[S],
    ) -> Result<OverallMetrics> {
        let predicted = Self::predict(classifier, features)?;
        Ok(Self::overall(labels, &predicted))
    }

    fn overall<S: AsRef<str>>(labels: &[S], predicted: &[String]) -> OverallMetrics {
        let (precision, recall, f1_score) = metrics::weighted_scores(labels, predicted);
        let overall = OverallMetrics {
            accuracy: metrics::accuracy(labels, predicted),
            precision,
            recall,
            f1_score,
            test_samples: labels.len(),
        };
        log::info!("Model Evaluation Results:");
        log::info!("  Accuracy:  {:.4}", overall.accuracy);
        log::info!("  Precision: {:.4}", overall.precision);
        log::info!("  Recall:    {:.4}", overall.recall);
        log::info!("  F1-Score:  {:.4}", overall.f1_score);
        overall
    }

    /// Confusion matrix in [`IntentClassifier::intent_classes`] order.
    pub fn confusion_matrix<S: AsRef<str>>(
        &self,
        classifier: &IntentClassifier,
        features: &[Vec<f64>],
        labels: &[S],
    ) -> Result<Vec<Vec<usize>>> {
        let predicted = Self::predict(classifier, features)?;
        Ok(metrics::confusion_matrix(
            labels,
            &predicted,
            classifier.intent_classes(),
        ))
    }

    pub fn classification_report<S: AsRef<str>>(
        &self,
        classifier: &IntentClassifier,
        features: &[Vec<f64>],
        labels: &[S],
    ) -> Result<String> {
        let predicted = Self::predict(classifier, features)?;
        let report =
            metrics::classification_report(labels, &predicted, classifier.intent_classes());
        log::debug!("Classification Report:\n{report}");
        Ok(report)
    }

    /// One-vs-rest metrics for every known intent.
    pub fn per_intent_metrics<S: AsRef<str>>(
        &self,
        classifier: &IntentClassifier,
        features: &[Vec<f64>],
        labels: &[S],
    ) -> Result<BTreeMap<String, IntentMetrics>> {
        let predicted = Self::predict(classifier, features)?;
        Ok(metrics::per_intent_metrics(
            labels,
            &predicted,
            classifier.intent_classes(),
        ))
    }

    pub fn confidence_distribution(
        &self,
        classifier: &IntentClassifier,
        features: &[Vec<f64>],
    ) -> Result<ConfidenceDistribution> {
        let confidences = classifier.confidence_scores(features)?;
        Ok(metrics::confidence_distribution(&confidences))
    }

    fn score(
        &self,
        features: &FeatureEngineer,
        classifier: &IntentClassifier,
        examples: &[TrainingExample],
    ) -> Result<Scored> {
        if examples.is_empty() {
            return Err(AugurError::InsufficientTrainingData {
                min_samples: 1,
                actual: 0,
            });
        }
        let texts: Vec<String> = examples.iter().map(|e| self.cleaner.clean(&e.text)).collect();
        let vectors = features.transform(&texts)?;
        let predicted = Self::predict(classifier, &vectors)?;
        let confidences = classifier.confidence_scores(&vectors)?;
        Ok(Scored {
            labels: examples.iter().map(|e| e.intent.clone()).collect(),
            predicted,
            confidences,
            classes: classifier.intent_classes().to_vec(),
        })
    }

    /// Full report for `examples`.
    pub fn evaluate_examples(
        &self,
        features: &FeatureEngineer,
        classifier: &IntentClassifier,
        examples: &[TrainingExample],
    ) -> Result<EvaluationReport> {
        let scored = self.score(features, classifier, examples)?;
        Ok(Self::summarize(&scored))
    }

    fn summarize(scored: &Scored) -> EvaluationReport {
        let per_intent =
            metrics::per_intent_metrics(&scored.labels, &scored.predicted, &scored.classes);
        let distribution = metrics::confidence_distribution(&scored.confidences);

        log::info!("Per-Intent Metrics:");
        for (intent, m) in &per_intent {
            log::info!(
                "  {intent}: P={:.3}, R={:.3}, F1={:.3}, S={}",
                m.precision,
                m.recall,
                m.f1,
                m.support
            );
        }
        log::info!(
            "Confidence: mean {:.4}, median {:.4}, high {} / medium {} / low {}",
            distribution.mean_confidence,
            distribution.median_confidence,
            distribution.high_confidence_count,
            distribution.medium_confidence_count,
            distribution.low_confidence_count
        );

        EvaluationReport {
            overall_metrics: Self::overall(&scored.labels, &scored.predicted),
            per_intent_metrics: per_intent,
            confidence_distribution: distribution,
            timestamp: Utc::now(),
        }
    }

    /// Score the persisted model against its own training corpus.
    ///
    /// This is a fit measurement, not a generalization estimate.
    pub fn evaluate_full(
        &self,
        artifacts: &ArtifactSet,
        corpus: &TrainingCorpus,
    ) -> Result<EvaluationReport> {
        Ok(self.evaluate_full_detailed(artifacts, corpus)?.0)
    }

    /// [`evaluate_full`](Self::evaluate_full) plus the text report, from a
    /// single load and scoring pass.
    pub fn evaluate_full_detailed(
        &self,
        artifacts: &ArtifactSet,
        corpus: &TrainingCorpus,
    ) -> Result<(EvaluationReport, String)> {
        let (features, classifier) = artifacts.load()?;
        let scored = self.score(&features, &classifier, &corpus.examples())?;
        let text = metrics::classification_report(&scored.labels, &scored.predicted, &scored.classes);
        Ok((Self::summarize(&scored), text))
    }

    /// Train on a shuffled split and score the held-out part.
    pub fn evaluate_holdout(
        &self,
        trainer: &ModelTrainer,
        corpus: &TrainingCorpus,
        test_ratio: f64,
        seed: u64,
    ) -> Result<EvaluationReport> {
        let (train, test) = corpus.split(test_ratio, seed)?;
        log::info!(
            "Hold-out evaluation: {} training / {} test examples",
            train.len(),
            test.len()
        );
        let model = trainer.train_examples(&train)?;
        self.evaluate_examples(&model.features, &model.classifier, &test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cleaner::AnalyzerCleaner;
    use crate::config::AugurConfig;
    use crate::ml::artifacts::ArtifactPaths;
    use tempfile::TempDir;

    fn corpus() -> TrainingCorpus {
        TrainingCorpus::from_pairs(vec![
            ("greeting", vec!["hello", "hi there", "good morning", "hey"]),
            ("farewell", vec!["bye", "goodbye", "see you later", "farewell"]),
            ("fees", vec!["fee structure", "tuition fees", "how much to pay", "fees amount"]),
        ])
        .unwrap()
    }

    fn evaluator() -> ModelEvaluator {
        ModelEvaluator::new(Arc::new(AnalyzerCleaner::simple().unwrap()))
    }

    #[test]
    fn test_perfect_classifier_report() {
        let features = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        let labels = ["a", "b", "a"];
        let mut classifier = IntentClassifier::default();
        classifier.train(&features, &labels).unwrap();

        let evaluator = evaluator();
        let overall = evaluator
            .evaluate_model(&classifier, &features, &labels)
            .unwrap();
        assert_eq!(overall.accuracy, 1.0);
        assert_eq!(overall.f1_score, 1.0);
        assert_eq!(overall.test_samples, 3);

        for m in evaluator
            .per_intent_metrics(&classifier, &features, &labels)
            .unwrap()
            .values()
        {
            assert_eq!((m.precision, m.recall, m.f1), (1.0, 1.0, 1.0));
        }

        let matrix = evaluator
            .confusion_matrix(&classifier, &features, &labels)
            .unwrap();
        assert_eq!(matrix, vec![vec![2, 0], vec![0, 1]]);
    }

    #[test]
    fn test_untrained_is_error() {
        let classifier = IntentClassifier::default();
        let result = evaluator().evaluate_model(&classifier, &[vec![1.0]], &["a"]);
        assert!(matches!(result, Err(AugurError::NotTrained(_))));
    }

    #[test]
    fn test_full_evaluation_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let set = ArtifactSet::new(ArtifactPaths::in_dir(dir.path().join("models")));
        let trainer = ModelTrainer::from_config(&AugurConfig::default()).unwrap();
        trainer.train(&corpus()).unwrap().publish(&set).unwrap();

        let report = evaluator().evaluate_full(&set, &corpus()).unwrap();
        assert_eq!(report.overall_metrics.test_samples, 12);
        assert_eq!(report.per_intent_metrics.len(), 3);
        assert!(report.overall_metrics.accuracy > 0.9);

        let path = dir.path().join("logs/report.json");
        report.save(&path).unwrap();
        report.save(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["overall_metrics"]["accuracy"].is_number());
        assert!(raw["per_intent_metrics"]["fees"]["support"].is_number());
        assert!(raw["confidence_distribution"]["median_confidence"].is_number());
        assert!(raw["timestamp"].is_string());
        let loaded = EvaluationReport::load(&path).unwrap();
        assert_eq!(loaded.overall_metrics.test_samples, 12);
        assert_eq!(loaded.timestamp, report.timestamp);

        let (detailed, text) = evaluator().evaluate_full_detailed(&set, &corpus()).unwrap();
        assert_eq!(detailed.overall_metrics.accuracy, report.overall_metrics.accuracy);
        assert_eq!(detailed.per_intent_metrics.len(), 3);
        assert!(text.contains("weighted avg"));
        assert!(text.contains("farewell"));
    }

    #[test]
    fn test_holdout_evaluation() {
        let trainer = ModelTrainer::from_config(&AugurConfig::default()).unwrap();
        let report = evaluator()
            .evaluate_holdout(&trainer, &corpus(), 0.25, 42)
            .unwrap();
        assert_eq!(report.overall_metrics.test_samples, 3);
    }
}
