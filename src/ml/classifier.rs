//! Multinomial naive Bayes intent classifier.
//!
//! The classifier and its [`LabelEncoder`] form one unit: they are trained
//! together, persisted together (two blobs sharing a pair id) and restored
//! together. Training always starts from scratch.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ClassifierConfig;
use crate::error::{AugurError, Result};
use crate::ml::artifacts::{self, ArtifactKind};
use crate::ml::label_encoder::LabelEncoder;

/// Learned naive Bayes parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NaiveBayesWeights {
    alpha: f64,
    fit_prior: bool,
    class_count: Vec<f64>,
    class_log_prior: Vec<f64>,
    /// `[class][feature]` log probabilities.
    feature_log_prob: Vec<Vec<f64>>,
    n_features: usize,
    vectorizer_fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
struct TrainedModel {
    weights: NaiveBayesWeights,
    encoder: LabelEncoder,
    pair_id: String,
}

/// Index of the first maximum in `row`.
pub fn argmax(row: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in row.iter().enumerate() {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Flat multi-class probabilistic intent model.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    config: ClassifierConfig,
    model: Option<TrainedModel>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Known intents in class-code order; empty until trained.
    pub fn intent_classes(&self) -> &[String] {
        self.model.as_ref().map_or(&[], |m| m.encoder.classes())
    }

    pub fn label_encoder(&self) -> Option<&LabelEncoder> {
        self.model.as_ref().map(|m| &m.encoder)
    }

    /// Width of the vectors the model was trained on; 0 until trained.
    pub fn n_features(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.weights.n_features)
    }

    /// Id shared by the model and encoder blobs of this training pass.
    pub fn pair_id(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.pair_id.as_str())
    }

    /// Record which vectorizer produced the training vectors.
    pub fn bind_vectorizer(&mut self, fingerprint: &str) -> Result<()> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| AugurError::not_trained("cannot bind an untrained classifier"))?;
        model.weights.vectorizer_fingerprint = Some(fingerprint.to_string());
        Ok(())
    }

    pub fn vectorizer_fingerprint(&self) -> Option<&str> {
        self.model
            .as_ref()
            .and_then(|m| m.weights.vectorizer_fingerprint.as_deref())
    }

    fn trained(&self) -> Result<&TrainedModel> {
        self.model
            .as_ref()
            .ok_or_else(|| AugurError::not_trained("call train or restore first"))
    }

    /// Fit the model and label encoder, replacing any previous state.
    pub fn train<S: AsRef<str>>(&mut self, features: &[Vec<f64>], labels: &[S]) -> Result<()> {
        self.config.validate()?;
        if features.len() != labels.len() {
            return Err(AugurError::invalid_features(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(AugurError::InsufficientTrainingData {
                min_samples: 1,
                actual: 0,
            });
        }
        let n_features = features[0].len();
        for (i, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(AugurError::invalid_features(format!(
                    "row {i} has width {}, expected {n_features}",
                    row.len()
                )));
            }
            if row.iter().any(|v| *v < 0.0 || !v.is_finite()) {
                return Err(AugurError::invalid_features(format!(
                    "row {i} contains negative or non-finite values"
                )));
            }
        }

        let encoder = LabelEncoder::fit(labels);
        let codes = encoder.encode_all(labels)?;
        let n_classes = encoder.len();

        let mut class_count = vec![0.0; n_classes];
        let mut feature_count = vec![vec![0.0; n_features]; n_classes];
        for (row, &code) in features.iter().zip(&codes) {
            class_count[code] += 1.0;
            for (total, value) in feature_count[code].iter_mut().zip(row) {
                *total += value;
            }
        }

        let alpha = self.config.alpha;
        let feature_log_prob = feature_count
            .iter()
            .map(|counts| {
                let denominator = (counts.iter().sum::<f64>() + alpha * n_features as f64).ln();
                counts
                    .iter()
                    .map(|c| (c + alpha).ln() - denominator)
                    .collect()
            })
            .collect();

        let n_samples = features.len() as f64;
        let class_log_prior = if self.config.fit_prior {
            class_count.iter().map(|c| (c / n_samples).ln()).collect()
        } else {
            vec![-(n_classes as f64).ln(); n_classes]
        };

        log::info!(
            "Classifier trained on {} samples, {} features, classes {:?}",
            features.len(),
            n_features,
            encoder.classes()
        );

        self.model = Some(TrainedModel {
            weights: NaiveBayesWeights {
                alpha,
                fit_prior: self.config.fit_prior,
                class_count,
                class_log_prior,
                feature_log_prob,
                n_features,
                vectorizer_fingerprint: None,
            },
            encoder,
            pair_id: Uuid::new_v4().to_string(),
        });
        Ok(())
    }

    fn joint_log_likelihood(weights: &NaiveBayesWeights, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != weights.n_features {
            return Err(AugurError::invalid_features(format!(
                "vector width {} does not match model width {}",
                row.len(),
                weights.n_features
            )));
        }
        Ok(weights
            .class_log_prior
            .iter()
            .zip(&weights.feature_log_prob)
            .map(|(prior, log_probs)| {
                prior
                    + row
                        .iter()
                        .zip(log_probs)
                        .map(|(x, lp)| x * lp)
                        .sum::<f64>()
            })
            .collect())
    }

    /// Per-row probability distribution over [`intent_classes`](Self::intent_classes).
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let model = self.trained()?;
        features
            .iter()
            .map(|row| {
                let jll = Self::joint_log_likelihood(&model.weights, row)?;
                let norm = log_sum_exp(&jll);
                Ok(jll.iter().map(|v| (v - norm).exp()).collect())
            })
            .collect()
    }

    /// Most probable intent per row.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<String>> {
        let model = self.trained()?;
        self.predict_proba(features)?
            .iter()
            .map(|probs| {
                let code = argmax(probs)
                    .ok_or_else(|| AugurError::not_trained("model has no classes"))?;
                model.encoder.decode(code).map(str::to_string)
            })
            .collect()
    }

    /// Per-row confidence: the largest predicted probability.
    pub fn confidence_scores(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|probs| probs.iter().copied().fold(0.0, f64::max))
            .collect())
    }

    /// Accuracy against `labels`; 0.0 when untrained or on failure.
    pub fn score<S: AsRef<str>>(&self, features: &[Vec<f64>], labels: &[S]) -> f64 {
        if !self.is_trained() {
            log::warn!("Scoring an untrained classifier");
            return 0.0;
        }
        if features.is_empty() || features.len() != labels.len() {
            return 0.0;
        }
        match self.predict(features) {
            Ok(predicted) => {
                let correct = predicted
                    .iter()
                    .zip(labels)
                    .filter(|(p, t)| p.as_str() == t.as_ref())
                    .count();
                correct as f64 / labels.len() as f64
            }
            Err(e) => {
                log::warn!("Scoring failed: {e}");
                0.0
            }
        }
    }

    /// Write the model and label encoder blobs.
    pub fn persist<P: AsRef<Path>, Q: AsRef<Path>>(&self, model_path: P, encoder_path: Q) -> Result<()> {
        let model = self.trained()?;
        artifacts::write_artifact(
            model_path.as_ref(),
            ArtifactKind::Model,
            &model.pair_id,
            &model.weights,
        )?;
        artifacts::write_artifact(
            encoder_path.as_ref(),
            ArtifactKind::LabelEncoder,
            &model.pair_id,
            &model.encoder,
        )?;
        log::info!(
            "Model saved to {} and label encoder to {}",
            model_path.as_ref().display(),
            encoder_path.as_ref().display()
        );
        Ok(())
    }

    /// Load the model and label encoder pair.
    ///
    /// Both blobs must load and agree; otherwise the classifier is left as
    /// it was.
    pub fn restore<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, model_path: P, encoder_path: Q) -> Result<()> {
        let model_path = model_path.as_ref();
        let encoder_path = encoder_path.as_ref();
        let (model_pair, weights): (String, NaiveBayesWeights) =
            artifacts::read_artifact(model_path, ArtifactKind::Model)?;
        let (encoder_pair, encoder): (String, LabelEncoder) =
            artifacts::read_artifact(encoder_path, ArtifactKind::LabelEncoder)?;

        if model_pair != encoder_pair {
            return Err(AugurError::artifact_load(
                encoder_path,
                "label encoder belongs to a different model",
            ));
        }
        if encoder.len() != weights.class_log_prior.len()
            || weights.feature_log_prob.len() != encoder.len()
            || weights
                .feature_log_prob
                .iter()
                .any(|row| row.len() != weights.n_features)
        {
            return Err(AugurError::artifact_load(
                model_path,
                "model weights do not match the label encoder",
            ));
        }

        self.config = ClassifierConfig {
            alpha: weights.alpha,
            fit_prior: weights.fit_prior,
        };
        self.model = Some(TrainedModel {
            weights,
            encoder,
            pair_id: model_pair,
        });
        log::info!("Model loaded from {}", model_path.display());
        Ok(())
    }

    pub fn from_artifacts<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, encoder_path: Q) -> Result<Self> {
        let mut classifier = Self::default();
        classifier.restore(model_path, encoder_path)?;
        Ok(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trained() -> (IntentClassifier, Vec<Vec<f64>>, Vec<&'static str>) {
        let features = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.8, 0.2, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.1, 0.9],
        ];
        let labels = vec!["greeting", "greeting", "farewell", "fees"];
        let mut classifier = IntentClassifier::default();
        classifier.train(&features, &labels).unwrap();
        (classifier, features, labels)
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (classifier, features, _) = trained();
        let proba = classifier.predict_proba(&features).unwrap();
        let confidence = classifier.confidence_scores(&features).unwrap();

        for (row, conf) in proba.iter().zip(&confidence) {
            assert_eq!(row.len(), 3);
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            let max = row.iter().copied().fold(0.0, f64::max);
            assert_eq!(*conf, max);
        }
    }

    #[test]
    fn test_predict_and_score() {
        let (classifier, features, labels) = trained();
        assert_eq!(classifier.intent_classes(), ["farewell", "fees", "greeting"]);
        assert_eq!(classifier.predict(&features).unwrap(), labels);
        assert_eq!(classifier.score(&features, &labels), 1.0);
    }

    #[test]
    fn test_untrained_behaviour() {
        let classifier = IntentClassifier::default();
        assert!(matches!(
            classifier.predict(&[vec![1.0]]),
            Err(AugurError::NotTrained(_))
        ));
        assert_eq!(classifier.score(&[vec![1.0]], &["x"]), 0.0);
        assert!(classifier.intent_classes().is_empty());
    }

    #[test]
    fn test_width_mismatch() {
        let (classifier, _, _) = trained();
        assert!(matches!(
            classifier.predict_proba(&[vec![1.0, 0.0]]),
            Err(AugurError::InvalidFeatureVector(_))
        ));
    }

    #[test]
    fn test_retrain_replaces_state() {
        let (mut classifier, _, _) = trained();
        let first_pair = classifier.pair_id().unwrap().to_string();
        classifier
            .train(&[vec![1.0, 0.0], vec![0.0, 1.0]], &["a", "b"])
            .unwrap();
        assert_eq!(classifier.intent_classes(), ["a", "b"]);
        assert_eq!(classifier.n_features(), 2);
        assert_ne!(classifier.pair_id().unwrap(), first_pair);
    }

    #[test]
    fn test_persist_restore_pair() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.bin");
        let encoder_path = dir.path().join("encoder.bin");
        let (mut classifier, features, _) = trained();
        classifier.bind_vectorizer("vec-1").unwrap();
        classifier.persist(&model_path, &encoder_path).unwrap();

        let restored = IntentClassifier::from_artifacts(&model_path, &encoder_path).unwrap();
        assert_eq!(
            restored.predict_proba(&features).unwrap(),
            classifier.predict_proba(&features).unwrap()
        );
        assert_eq!(restored.vectorizer_fingerprint(), Some("vec-1"));

        // An encoder from another training pass is rejected.
        let (other, _, _) = trained();
        let other_model = dir.path().join("other_model.bin");
        let other_encoder = dir.path().join("other_encoder.bin");
        other.persist(&other_model, &other_encoder).unwrap();

        let mut mixed = IntentClassifier::default();
        let err = mixed.restore(&model_path, &other_encoder).unwrap_err();
        assert!(err.is_artifact_load());
        assert!(!mixed.is_trained());
    }
}
