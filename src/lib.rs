//! # Augur
//!
//! Closed-loop intent classification for question-answering services.
//!
//! ## Features
//!
//! - TF-IDF feature engineering over unigrams and bigrams
//! - Multinomial naive Bayes classification with a fixed-order label encoder
//! - Confidence-gated routing with an atomically updated threshold
//! - Evaluation reports (accuracy, weighted and per-intent metrics,
//!   confidence distribution)
//! - A retraining loop that harvests low-confidence queries, augments the
//!   corpus and publishes freshly trained artifacts

pub mod analysis;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod ml;
pub mod util;

pub mod prelude {
    pub use crate::config::AugurConfig;
    pub use crate::corpus::{TrainingCorpus, TrainingExample};
    pub use crate::error::{AugurError, Result};
    pub use crate::ml::{
        ArtifactPaths, ArtifactSet, ConfidenceChecker, IntentPredictor, ModelEvaluator,
        ModelRetrainer, ModelTrainer, Prediction,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
