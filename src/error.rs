//! Error types for the Augur library.
//!
//! All fallible operations in Augur return [`Result`], whose error side is the
//! [`AugurError`] enum. Constructor helpers keep call sites short:
//!
//! ```
//! use augur::error::{AugurError, Result};
//!
//! fn check(threshold: f64) -> Result<()> {
//!     if !(0.0..=1.0).contains(&threshold) {
//!         return Err(AugurError::invalid_config(format!(
//!             "threshold {threshold} must be between 0 and 1"
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(1.5).is_err());
//! ```

use std::io;
use std::path::Path;

use thiserror::Error;

/// The main error type for Augur operations.
///
/// The first group of variants mirrors the failure kinds the learning loop
/// distinguishes; the rest wrap lower-level errors via `#[from]`.
#[derive(Error, Debug)]
pub enum AugurError {
    /// The feature engineer was used before `fit` or `restore`.
    #[error("Vectorizer not fitted: {0}")]
    NotFitted(String),

    /// The classifier was used before `train` or `restore`.
    #[error("Model not trained: {0}")]
    NotTrained(String),

    /// A persisted artifact is missing, corrupt, or does not match its pair.
    #[error("Artifact load failed for {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    /// The low-confidence record store could not be read.
    #[error("Storage read failed: {0}")]
    StorageRead(String),

    /// A report, history, corpus or artifact could not be written.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration or argument outside its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not enough data to fit a model.
    #[error("Training data insufficient: need at least {min_samples} samples, got {actual}")]
    InsufficientTrainingData { min_samples: usize, actual: usize },

    /// Feature matrix does not fit the model it is applied to.
    #[error("Invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    /// Training corpus is malformed.
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Another writer holds the artifact set.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary artifact encoding errors
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Any record-store failure is a storage read failure.
impl From<rusqlite::Error> for AugurError {
    fn from(e: rusqlite::Error) -> Self {
        AugurError::StorageRead(format!("SQLite error: {e}"))
    }
}

/// Result type alias for operations that may fail with AugurError.
pub type Result<T> = std::result::Result<T, AugurError>;

impl AugurError {
    /// Create a new not-fitted error.
    pub fn not_fitted<S: Into<String>>(msg: S) -> Self {
        AugurError::NotFitted(msg.into())
    }

    /// Create a new not-trained error.
    pub fn not_trained<S: Into<String>>(msg: S) -> Self {
        AugurError::NotTrained(msg.into())
    }

    /// Create a new artifact load error for the given path.
    pub fn artifact_load<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        AugurError::ArtifactLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new storage read error.
    pub fn storage_read<S: Into<String>>(msg: S) -> Self {
        AugurError::StorageRead(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        AugurError::Serialization(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        AugurError::InvalidConfiguration(msg.into())
    }

    /// Create a new invalid feature vector error.
    pub fn invalid_features<S: Into<String>>(msg: S) -> Self {
        AugurError::InvalidFeatureVector(msg.into())
    }

    /// Create a new corpus error.
    pub fn corpus<S: Into<String>>(msg: S) -> Self {
        AugurError::Corpus(msg.into())
    }

    /// Create a new lock error.
    pub fn lock_failed<S: Into<String>>(msg: S) -> Self {
        AugurError::LockFailed(msg.into())
    }

    /// Whether this error came from loading a persisted artifact.
    pub fn is_artifact_load(&self) -> bool {
        matches!(self, AugurError::ArtifactLoad { .. })
    }
}
