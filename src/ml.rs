//! The intent classification learning loop.
//!
//! Leaves first:
//!
//! - [`features`]: TF-IDF vocabulary and vectors.
//! - [`classifier`] and [`label_encoder`]: multinomial naive Bayes over
//!   string intents.
//! - [`confidence`]: the routing threshold and confidence bands.
//! - [`predictor`]: serving-time prediction with atomic model swaps.
//! - [`metrics`] and [`evaluator`]: quality reports.
//! - [`records`], [`history`] and [`retrainer`]: the harvest, augment,
//!   retrain, verify loop.
//! - [`artifacts`] and [`trainer`]: persisted model blobs and how they are
//!   produced.

pub mod artifacts;
pub mod classifier;
pub mod confidence;
pub mod evaluator;
pub mod features;
pub mod history;
pub mod label_encoder;
pub mod metrics;
pub mod predictor;
pub mod records;
pub mod retrainer;
pub mod trainer;

pub use artifacts::{ArtifactPaths, ArtifactSet};
pub use classifier::IntentClassifier;
pub use confidence::{ConfidenceChecker, ConfidenceLevel, Recommendation};
pub use evaluator::{EvaluationReport, ModelEvaluator};
pub use features::FeatureEngineer;
pub use predictor::{IntentPredictor, Prediction};
pub use records::{InMemoryRecordStore, LowConfidenceRecord, LowConfidenceStore, SqliteRecordStore};
pub use retrainer::ModelRetrainer;
pub use trainer::{ModelTrainer, TrainedModel};
