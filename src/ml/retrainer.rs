//! The closed learning loop.
//!
//! One retraining pass runs four phases in order:
//!
//! 1. **Harvest** low-confidence records below the current threshold. A
//!    store failure counts as zero records.
//! 2. **Augment** the corpus: each harvested query is appended to the
//!    intent it was *predicted* as, unless already present. Failures are
//!    logged and the pass continues on the existing corpus.
//! 3. **Retrain** cold: a new vectorizer and classifier are fitted from
//!    scratch and published. This is the only phase whose failure aborts
//!    the pass.
//! 4. **Verify and record**: the published artifacts are reloaded and
//!    scored against the corpus, then one event is appended to the history.
//!
//! The harvest is taken once per pass, so every augmentation decision in a
//! pass is made against the same snapshot. Phases 2 to 4 run under the
//! artifact set's exclusive lock, so passes sharing a set (in this process
//! or another) never interleave their corpus, artifact or history writes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AugurConfig;
use crate::corpus::TrainingCorpus;
use crate::error::Result;
use crate::ml::artifacts::{ArtifactSet, ArtifactWriteGuard};
use crate::ml::classifier::IntentClassifier;
use crate::ml::confidence::ConfidenceChecker;
use crate::ml::features::FeatureEngineer;
use crate::ml::history::{RetrainingEvent, RetrainingHistory, RetrainingStatus};
use crate::ml::predictor::IntentPredictor;
use crate::ml::records::{LowConfidenceRecord, LowConfidenceStore};
use crate::ml::trainer::{ModelTrainer, TrainedModel};

/// Records collected in the harvest phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestReport {
    pub total_low_confidence: usize,
    pub queries: Vec<LowConfidenceRecord>,
}

/// Accuracy of the freshly published model on its corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub new_model_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of one successful retraining pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub augmented: usize,
    pub samples_count: usize,
    pub verification: Option<VerificationReport>,
    /// Threshold in effect after the pass.
    pub threshold: f64,
}

/// Result of [`ModelRetrainer::full_pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub harvested: usize,
    pub outcome: RetrainOutcome,
    pub status: RetrainingStatus,
}

/// Drives harvest, augmentation, retraining and verification.
pub struct ModelRetrainer {
    corpus_path: PathBuf,
    artifacts: ArtifactSet,
    trainer: ModelTrainer,
    store: Arc<dyn LowConfidenceStore>,
    checker: Arc<ConfidenceChecker>,
    history: RetrainingHistory,
    adaptive_threshold: bool,
    recent_events: usize,
    predictor: Option<Arc<IntentPredictor>>,
}

impl std::fmt::Debug for ModelRetrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRetrainer")
            .field("corpus_path", &self.corpus_path)
            .field("artifacts", self.artifacts.paths())
            .field("history", &self.history.path())
            .field("adaptive_threshold", &self.adaptive_threshold)
            .finish()
    }
}

impl ModelRetrainer {
    pub fn new(
        config: &AugurConfig,
        artifacts: ArtifactSet,
        store: Arc<dyn LowConfidenceStore>,
        checker: Arc<ConfidenceChecker>,
    ) -> Result<Self> {
        Ok(Self {
            corpus_path: config.paths.corpus.clone(),
            artifacts,
            trainer: ModelTrainer::from_config(config)?,
            store,
            checker,
            history: RetrainingHistory::new(config.paths.history.clone()),
            adaptive_threshold: config.retrain.adaptive_threshold,
            recent_events: config.retrain.recent_events,
            predictor: None,
        })
    }

    /// Reload `predictor` after every successful publish.
    pub fn with_predictor(mut self, predictor: Arc<IntentPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_trainer(mut self, trainer: ModelTrainer) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn checker(&self) -> &ConfidenceChecker {
        &self.checker
    }

    pub fn history(&self) -> &RetrainingHistory {
        &self.history
    }

    /// Phase 1: records below the current threshold, worst first.
    pub fn collect_low_confidence(&self) -> HarvestReport {
        let threshold = self.checker.threshold();
        match self.store.harvest(threshold) {
            Ok(queries) => {
                log::info!(
                    "Collected {} low-confidence queries below {threshold}",
                    queries.len()
                );
                HarvestReport {
                    total_low_confidence: queries.len(),
                    queries,
                }
            }
            Err(e) => {
                log::error!("Error collecting low-confidence queries: {e}");
                HarvestReport::default()
            }
        }
    }

    /// Phase 2: add harvested queries to the corpus and persist it.
    ///
    /// Returns the number of patterns added.
    pub fn augment(&self, records: &[LowConfidenceRecord]) -> Result<usize> {
        let _guard = self.artifacts.lock_exclusive()?;
        self.augment_corpus(records)
    }

    fn augment_corpus(&self, records: &[LowConfidenceRecord]) -> Result<usize> {
        if records.is_empty() {
            log::info!("No low-confidence queries to augment training data");
            return Ok(0);
        }
        let mut corpus = TrainingCorpus::load(&self.corpus_path)?;
        let added = records
            .iter()
            .filter(|r| corpus.augment(&r.query, &r.predicted_intent))
            .count();
        if added > 0 {
            corpus.save(&self.corpus_path)?;
        }
        log::info!("Augmented training data with {added} new patterns");
        Ok(added)
    }

    /// Phase 3: fit from scratch on the corpus and publish the artifacts.
    pub fn cold_retrain(&self) -> Result<TrainedModel> {
        let guard = self.artifacts.lock_exclusive()?;
        self.train_and_publish(&guard)
    }

    fn train_and_publish(&self, guard: &ArtifactWriteGuard<'_>) -> Result<TrainedModel> {
        let corpus = TrainingCorpus::load(&self.corpus_path)?;
        let model = self.trainer.train(&corpus)?;
        model.write_to(guard)?;
        Ok(model)
    }

    /// Reload the published artifacts and score them on the corpus.
    pub fn verify(&self) -> Result<VerificationReport> {
        let pair = self.artifacts.load()?;
        self.score_pair(pair)
    }

    fn score_pair(
        &self,
        (features, classifier): (FeatureEngineer, IntentClassifier),
    ) -> Result<VerificationReport> {
        let corpus = TrainingCorpus::load(&self.corpus_path)?;
        let model = TrainedModel {
            features,
            classifier,
            samples_count: corpus.pattern_count(),
        };
        let accuracy = model.score(self.trainer.cleaner().as_ref(), &corpus.examples());
        log::info!("New model accuracy: {accuracy:.4}");
        Ok(VerificationReport {
            new_model_accuracy: accuracy,
            timestamp: Utc::now(),
        })
    }

    fn record_event(&self, success: bool, samples_count: usize) {
        let paths = self.artifacts.paths();
        let event = RetrainingEvent::new(success, samples_count, &paths.model, &paths.vectorizer);
        if let Err(e) = self.history.append(event) {
            log::error!("Error logging retraining event: {e}");
        }
    }

    /// Phases 2 to 4 against an already harvested snapshot.
    fn run(&self, snapshot: Option<&[LowConfidenceRecord]>) -> Result<RetrainOutcome> {
        let guard = self.artifacts.lock_exclusive().inspect_err(|e| {
            log::error!("Model artifacts are locked, retraining skipped: {e}");
        })?;

        log::info!("[2/4] Retraining model...");
        let augmented = match snapshot {
            Some(records) => self.augment_corpus(records).unwrap_or_else(|e| {
                log::warn!("Data augmentation failed, continuing with existing data: {e}");
                0
            }),
            None => 0,
        };

        let model = match self.train_and_publish(&guard) {
            Ok(model) => model,
            Err(e) => {
                log::error!("Model retraining failed: {e}");
                self.record_event(false, 0);
                return Err(e);
            }
        };

        log::info!("[3/4] Verifying model...");
        let verification = guard
            .load()
            .and_then(|pair| self.score_pair(pair))
            .map_err(|e| log::error!("Error verifying model: {e}"))
            .ok();
        if let (true, Some(report)) = (self.adaptive_threshold, verification) {
            self.checker.adjust(report.new_model_accuracy);
        }

        log::info!("[4/4] Recording retraining event...");
        self.record_event(true, model.samples_count);
        drop(guard);

        if let Some(predictor) = &self.predictor
            && let Err(e) = predictor.reload()
        {
            log::error!("Published model could not be swapped in: {e}");
        }

        Ok(RetrainOutcome {
            augmented,
            samples_count: model.samples_count,
            verification,
            threshold: self.checker.threshold(),
        })
    }

    /// One retraining pass, optionally augmenting from the record store.
    pub fn retrain(&self, use_augmented_data: bool) -> Result<RetrainOutcome> {
        log::info!("Starting model retraining...");
        let snapshot = if use_augmented_data {
            log::info!("[1/4] Collecting low-confidence queries...");
            Some(self.collect_low_confidence().queries)
        } else {
            None
        };
        let outcome = self.run(snapshot.as_deref())?;
        log::info!("Model retraining completed successfully");
        Ok(outcome)
    }

    /// Harvest, retrain with augmentation, verify and summarize.
    ///
    /// Only a failed retrain phase makes this return an error.
    pub fn full_pipeline(&self) -> Result<PipelineSummary> {
        log::info!("Starting full retraining pipeline");
        log::info!("[1/4] Collecting low-confidence queries...");
        let harvest = self.collect_low_confidence();

        let outcome = self.run(Some(&harvest.queries))?;

        let status = self.status().unwrap_or_else(|e| {
            log::error!("Error getting retraining status: {e}");
            RetrainingStatus {
                retraining_count: 0,
                last_retraining: None,
                successful_retrainings: 0,
                failed_retrainings: 0,
                recent_events: Vec::new(),
            }
        });
        log::info!(
            "Retraining pipeline complete: {} runs, {} successful, {} failed",
            status.retraining_count,
            status.successful_retrainings,
            status.failed_retrainings
        );

        Ok(PipelineSummary {
            harvested: harvest.total_low_confidence,
            outcome,
            status,
        })
    }

    /// Totals and recent events, recomputed from the history file.
    pub fn status(&self) -> Result<RetrainingStatus> {
        self.history.status(self.recent_events)
    }
}
