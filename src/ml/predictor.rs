//! Serving-time intent prediction.
//!
//! [`IntentPredictor`] holds the current vectorizer/classifier pair behind
//! an `RwLock<Option<Arc<_>>>`. Predictions clone the `Arc` and release the
//! lock immediately, so a reload swaps the pair without blocking or tearing
//! in-flight requests.
//!
//! Every prediction entry point is infallible: anything that goes wrong
//! (no model loaded, a vectorizer error, ...) collapses to the sentinel
//! prediction `("unknown", 0.0)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::cleaner::TextCleaner;
use crate::error::{AugurError, Result};
use crate::ml::artifacts::ArtifactSet;
use crate::ml::classifier::{IntentClassifier, argmax};
use crate::ml::confidence::{ConfidenceChecker, ConfidenceLevel, Recommendation};
use crate::ml::features::FeatureEngineer;
use crate::ml::records::{LowConfidenceRecord, LowConfidenceStore};
use crate::ml::trainer::TrainedModel;

/// Intent reported when no prediction could be made.
pub const UNKNOWN_INTENT: &str = "unknown";

/// A predicted intent and its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub intent: String,
    pub confidence: f64,
}

impl Prediction {
    /// The sentinel `("unknown", 0.0)`.
    pub fn unknown() -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.intent == UNKNOWN_INTENT && self.confidence == 0.0
    }
}

/// Diagnostic view of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDetails {
    pub query: String,
    pub cleaned_query: String,
    pub predicted_intent: String,
    pub all_scores: BTreeMap<String, f64>,
    pub top_intent_score: f64,
}

/// A prediction together with its routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPrediction {
    pub query: String,
    pub intent: String,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub recommendation: Recommendation,
    /// Whether the query was stored as a low-confidence record.
    pub recorded: bool,
}

/// A loaded vectorizer and classifier that belong together.
#[derive(Debug)]
pub struct ServingModel {
    features: FeatureEngineer,
    classifier: IntentClassifier,
}

impl ServingModel {
    pub fn new(features: FeatureEngineer, classifier: IntentClassifier) -> Self {
        Self {
            features,
            classifier,
        }
    }

    pub fn features(&self) -> &FeatureEngineer {
        &self.features
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Probabilities for one cleaned text, in class order.
    fn probabilities(&self, cleaned: &str) -> Result<Vec<f64>> {
        let vector = self.features.transform_one(cleaned)?;
        self.classifier
            .predict_proba(&[vector])?
            .pop()
            .ok_or_else(|| AugurError::invalid_features("classifier returned no rows"))
    }

    fn classify(&self, cleaned: &str) -> Result<(String, f64, Vec<f64>)> {
        let probs = self.probabilities(cleaned)?;
        let code = argmax(&probs).ok_or_else(|| AugurError::not_trained("model has no classes"))?;
        let intent = self
            .classifier
            .label_encoder()
            .ok_or_else(|| AugurError::not_trained("label encoder missing"))?
            .decode(code)?
            .to_string();
        Ok((intent, probs[code], probs))
    }
}

impl From<TrainedModel> for ServingModel {
    fn from(model: TrainedModel) -> Self {
        Self::new(model.features, model.classifier)
    }
}

/// Classifies live queries.
pub struct IntentPredictor {
    artifacts: ArtifactSet,
    cleaner: Arc<dyn TextCleaner>,
    model: RwLock<Option<Arc<ServingModel>>>,
}

impl std::fmt::Debug for IntentPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentPredictor")
            .field("artifacts", self.artifacts.paths())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl IntentPredictor {
    /// Predictor over `artifacts`; nothing is loaded until [`load`](Self::load).
    pub fn new(artifacts: ArtifactSet, cleaner: Arc<dyn TextCleaner>) -> Self {
        Self {
            artifacts,
            cleaner,
            model: RwLock::new(None),
        }
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    /// The pair currently serving, if any.
    pub fn current(&self) -> Option<Arc<ServingModel>> {
        self.model.read().clone()
    }

    /// Install a model pair, returning the one it replaced.
    pub fn swap(&self, model: ServingModel) -> Option<Arc<ServingModel>> {
        let mut guard = self.model.write();
        std::mem::replace(&mut *guard, Some(Arc::new(model)))
    }

    /// Load the vectorizer, classifier and label encoder from disk.
    ///
    /// The predictor only becomes loaded when all three load and agree; on
    /// failure the previously loaded pair (if any) keeps serving.
    pub fn load(&self) -> Result<()> {
        let (features, classifier) = self.artifacts.load()?;
        self.swap(ServingModel::new(features, classifier));
        log::info!("Models loaded successfully");
        Ok(())
    }

    /// Re-read the artifacts and swap them in.
    pub fn reload(&self) -> Result<()> {
        let replaced = self.is_loaded();
        self.load()?;
        if replaced {
            log::info!("Serving model replaced");
        }
        Ok(())
    }

    fn predict_with(&self, model: &ServingModel, query: &str) -> Prediction {
        let cleaned = self.cleaner.clean(query);
        match model.classify(&cleaned) {
            Ok((intent, confidence, _)) => {
                log::debug!("Query: '{query}' -> Intent: {intent}, Confidence: {confidence:.4}");
                Prediction { intent, confidence }
            }
            Err(e) => {
                log::error!("Error predicting intent for '{query}': {e}");
                Prediction::unknown()
            }
        }
    }

    /// Predict the intent of one query; never fails.
    pub fn predict_intent(&self, query: &str) -> Prediction {
        match self.current() {
            Some(model) => self.predict_with(&model, query),
            None => {
                log::warn!("Models not loaded, call load first");
                Prediction::unknown()
            }
        }
    }

    /// Predict each query independently, preserving input order.
    ///
    /// The whole batch is served by the model current when the call starts.
    pub fn predict_batch<S: AsRef<str> + Sync>(&self, queries: &[S]) -> Vec<Prediction> {
        let Some(model) = self.current() else {
            log::warn!("Models not loaded, call load first");
            return vec![Prediction::unknown(); queries.len()];
        };
        queries
            .par_iter()
            .map(|q| self.predict_with(&model, q.as_ref()))
            .collect()
    }

    /// Full per-intent probabilities for one query.
    pub fn intent_details(&self, query: &str) -> Result<IntentDetails> {
        let model = self
            .current()
            .ok_or_else(|| AugurError::not_trained("models not loaded"))?;
        let cleaned = self.cleaner.clean(query);
        let (intent, confidence, probs) = model.classify(&cleaned)?;
        let all_scores = model
            .classifier()
            .intent_classes()
            .iter()
            .cloned()
            .zip(probs)
            .collect();
        Ok(IntentDetails {
            query: query.to_string(),
            cleaned_query: cleaned,
            predicted_intent: intent,
            all_scores,
            top_intent_score: confidence,
        })
    }

    /// Predict, decide the route, and store the query when it falls below
    /// the threshold.
    ///
    /// The query is classified once, so the stored score mapping always
    /// comes from the model that produced the routed intent. Sentinel
    /// predictions are never stored: they carry no usable label.
    pub fn route(
        &self,
        query: &str,
        checker: &ConfidenceChecker,
        store: &dyn LowConfidenceStore,
    ) -> RoutedPrediction {
        let details = if self.is_loaded() {
            self.intent_details(query)
                .map_err(|e| log::error!("Error predicting intent for '{query}': {e}"))
                .ok()
        } else {
            log::warn!("Models not loaded, call load first");
            None
        };
        let prediction = details
            .as_ref()
            .map(|d| Prediction {
                intent: d.predicted_intent.clone(),
                confidence: d.top_intent_score,
            })
            .unwrap_or_else(Prediction::unknown);
        let (confident, level) = checker.evaluate_prediction(prediction.confidence);
        let recommendation = checker.recommend(prediction.confidence);

        let mut recorded = false;
        if let Some(details) = details.filter(|_| !confident) {
            let record = LowConfidenceRecord::new(
                query,
                details.predicted_intent,
                details.top_intent_score,
                details.all_scores,
            );
            match store.record(&record) {
                Ok(()) => recorded = true,
                Err(e) => log::warn!("Failed to store low-confidence query '{query}': {e}"),
            }
        }

        RoutedPrediction {
            query: query.to_string(),
            intent: prediction.intent,
            confidence: prediction.confidence,
            level,
            recommendation,
            recorded,
        }
    }
}
