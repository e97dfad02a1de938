//! TF-IDF feature engineering.
//!
//! [`FeatureEngineer`] owns the vocabulary. `fit` builds it once from a set
//! of texts and freezes it; `transform` maps any text onto fixed-width
//! vectors over that vocabulary.
//!
//! Weighting follows the usual smoothed scheme:
//!
//! ```text
//! idf(t)   = ln((1 + n) / (1 + df(t))) + 1
//! w(t, d)  = count(t, d) * idf(t), then each row is L2-normalised
//! ```
//!
//! Terms are unigrams and bigrams (by default) over the analyzer's output,
//! so stop words never form part of an n-gram.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::analyzer::{Analyzer, EnglishAnalyzer};
use crate::config::FeatureConfig;
use crate::error::{AugurError, Result};
use crate::ml::artifacts::{self, ArtifactKind};

/// Frozen vocabulary and weights produced by one `fit`.
#[derive(Debug, Clone)]
struct Vocabulary {
    /// Terms in index order (sorted).
    terms: Vec<String>,
    index: AHashMap<String, usize>,
    idf: Vec<f64>,
    n_documents: usize,
    fingerprint: String,
}

/// Serialized form of a fitted vectorizer.
#[derive(Debug, Serialize, Deserialize)]
struct VectorizerState {
    config: FeatureConfig,
    analyzer: String,
    terms: Vec<String>,
    idf: Vec<f64>,
    n_documents: usize,
}

impl Vocabulary {
    fn from_state(state: VectorizerState, fingerprint: String) -> Result<Self> {
        if state.terms.len() != state.idf.len() {
            return Err(AugurError::invalid_features(format!(
                "vocabulary has {} terms but {} idf weights",
                state.terms.len(),
                state.idf.len()
            )));
        }
        let index = state
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Ok(Self {
            terms: state.terms,
            index,
            idf: state.idf,
            n_documents: state.n_documents,
            fingerprint,
        })
    }
}

/// Builds and applies a bounded TF-IDF vocabulary.
#[derive(Clone)]
pub struct FeatureEngineer {
    config: FeatureConfig,
    analyzer: Arc<dyn Analyzer>,
    vocabulary: Option<Vocabulary>,
}

impl std::fmt::Debug for FeatureEngineer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureEngineer")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .field("vocabulary_size", &self.vector_dimensions())
            .finish()
    }
}

impl FeatureEngineer {
    /// Unfitted engineer using the English analyzer.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        Ok(Self::with_analyzer(config, Arc::new(EnglishAnalyzer::new()?)))
    }

    pub fn with_analyzer(config: FeatureConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            config,
            analyzer,
            vocabulary: None,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }

    /// Vector width; 0 until fitted.
    pub fn vector_dimensions(&self) -> usize {
        self.vocabulary.as_ref().map_or(0, |v| v.terms.len())
    }

    /// Vocabulary terms in feature index order.
    pub fn feature_names(&self) -> &[String] {
        self.vocabulary.as_ref().map_or(&[], |v| v.terms.as_slice())
    }

    /// Identifier minted by the last successful fit.
    pub fn fingerprint(&self) -> Option<&str> {
        self.vocabulary.as_ref().map(|v| v.fingerprint.as_str())
    }

    /// Terms (n-grams) extracted from one text.
    fn terms(&self, text: &str) -> Result<Vec<String>> {
        let words = self.analyzer.terms(text)?;
        let (low, high) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in low..=high {
            if n == 1 {
                terms.extend(words.iter().cloned());
            } else {
                terms.extend(words.windows(n).map(|w| w.join(" ")));
            }
        }
        Ok(terms)
    }

    /// Build the vocabulary from `texts`, replacing any previous one.
    pub fn fit<S: AsRef<str>>(&mut self, texts: &[S]) -> Result<()> {
        self.config.validate()?;
        let n = texts.len();
        if n == 0 {
            return Err(AugurError::InsufficientTrainingData {
                min_samples: 1,
                actual: 0,
            });
        }

        let mut document_frequency: AHashMap<String, usize> = AHashMap::new();
        let mut term_frequency: AHashMap<String, usize> = AHashMap::new();
        for text in texts {
            let terms = self.terms(text.as_ref())?;
            let mut seen = HashSet::new();
            for term in terms {
                *term_frequency.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *document_frequency.entry(term).or_insert(0) += 1;
                }
            }
        }

        let max_doc_count = self.config.max_df * n as f64;
        let min_doc_count = self.config.min_df;
        if max_doc_count < min_doc_count as f64 {
            return Err(AugurError::invalid_config(format!(
                "max_df {} keeps fewer documents than min_df {}",
                self.config.max_df, min_doc_count
            )));
        }

        let mut kept: Vec<(String, usize)> = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= min_doc_count && (*df as f64) <= max_doc_count)
            .collect();

        if kept.len() > self.config.max_features {
            kept.sort_by(|(a, _), (b, _)| {
                let count = |t: &String| term_frequency.get(t).copied().unwrap_or(0);
                count(b)
                    .cmp(&count(a))
                    .then_with(|| a.cmp(b))
            });
            kept.truncate(self.config.max_features);
        }

        if kept.is_empty() {
            return Err(AugurError::invalid_features(
                "empty vocabulary; the texts contain only stop words or pruned terms",
            ));
        }

        kept.sort_by(|(a, _), (b, _)| a.cmp(b));
        let idf = kept
            .iter()
            .map(|(_, df)| ((1.0 + n as f64) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();
        let terms = kept.into_iter().map(|(term, _)| term).collect();

        let vocabulary = Vocabulary::from_state(
            VectorizerState {
                config: self.config.clone(),
                analyzer: self.analyzer.name().to_string(),
                terms,
                idf,
                n_documents: n,
            },
            Uuid::new_v4().to_string(),
        )?;
        log::info!(
            "Vectorizer fitted on {n} texts: {} features",
            vocabulary.terms.len()
        );
        self.vocabulary = Some(vocabulary);
        Ok(())
    }

    /// TF-IDF vector for one text.
    pub fn transform_one(&self, text: &str) -> Result<Vec<f64>> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| AugurError::not_fitted("call fit or restore before transform"))?;

        let mut row = vec![0.0; vocabulary.terms.len()];
        for term in self.terms(text)? {
            if let Some(&idx) = vocabulary.index.get(&term) {
                row[idx] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&vocabulary.idf) {
            *value *= idf;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut row {
                *value /= norm;
            }
        }
        Ok(row)
    }

    /// TF-IDF vectors for `texts`, one row per text.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f64>>> {
        texts.iter().map(|t| self.transform_one(t.as_ref())).collect()
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, texts: &[S]) -> Result<Vec<Vec<f64>>> {
        self.fit(texts)?;
        self.transform(texts)
    }

    /// Write the fitted vocabulary and weights as one artifact.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| AugurError::not_fitted("nothing to persist"))?;
        let state = VectorizerState {
            config: self.config.clone(),
            analyzer: self.analyzer.name().to_string(),
            terms: vocabulary.terms.clone(),
            idf: vocabulary.idf.clone(),
            n_documents: vocabulary.n_documents,
        };
        artifacts::write_artifact(
            path.as_ref(),
            ArtifactKind::Vectorizer,
            &vocabulary.fingerprint,
            &state,
        )?;
        log::info!("Vectorizer saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace this engineer's state with a persisted one.
    ///
    /// On failure the current state is left untouched.
    pub fn restore<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let (fingerprint, state): (String, VectorizerState) =
            artifacts::read_artifact(path, ArtifactKind::Vectorizer)?;
        if state.analyzer != self.analyzer.name() {
            log::warn!(
                "Vectorizer {} was fitted with analyzer '{}', restoring under '{}'",
                path.display(),
                state.analyzer,
                self.analyzer.name()
            );
        }
        let config = state.config.clone();
        let vocabulary = Vocabulary::from_state(state, fingerprint)
            .map_err(|e| AugurError::artifact_load(path, e.to_string()))?;
        self.config = config;
        self.vocabulary = Some(vocabulary);
        log::info!("Vectorizer loaded from {}", path.display());
        Ok(())
    }

    /// Load a persisted vectorizer with the English analyzer.
    pub fn from_artifact<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut engineer = Self::new(FeatureConfig::default())?;
        engineer.restore(path)?;
        Ok(engineer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fitted() -> FeatureEngineer {
        let mut engineer = FeatureEngineer::new(FeatureConfig::default()).unwrap();
        engineer
            .fit(&["hostel fees per year", "admission deadline", "hostel timings"])
            .unwrap();
        engineer
    }

    #[test]
    fn test_vocabulary_sorted_with_bigrams() {
        let engineer = fitted();
        let names = engineer.feature_names();

        assert!(names.contains(&"hostel".to_string()));
        assert!(names.contains(&"hostel fees".to_string()));
        assert!(names.contains(&"admission deadline".to_string()));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(engineer.vector_dimensions(), names.len());
    }

    #[test]
    fn test_transform_width_and_unseen_tokens() {
        let engineer = fitted();
        let before = engineer.feature_names().to_vec();

        let rows = engineer
            .transform(&["completely unseen words", "hostel fees"])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == engineer.vector_dimensions()));
        assert!(rows[0].iter().all(|v| *v == 0.0));

        let norm: f64 = rows[1].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(engineer.feature_names(), before.as_slice());
    }

    #[test]
    fn test_idf_weighting() {
        let engineer = fitted();
        let row = engineer.transform_one("hostel admission").unwrap();
        let hostel = engineer
            .feature_names()
            .iter()
            .position(|t| t == "hostel")
            .unwrap();
        let admission = engineer
            .feature_names()
            .iter()
            .position(|t| t == "admission")
            .unwrap();
        // "hostel" appears in two documents, "admission" in one.
        assert!(row[admission] > row[hostel]);
    }

    #[test]
    fn test_transform_before_fit() {
        let engineer = FeatureEngineer::new(FeatureConfig::default()).unwrap();
        assert!(matches!(
            engineer.transform(&["hello"]),
            Err(AugurError::NotFitted(_))
        ));
        assert_eq!(engineer.vector_dimensions(), 0);
        assert!(engineer.fingerprint().is_none());
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let config = FeatureConfig {
            max_features: 2,
            ngram_range: (1, 1),
            ..FeatureConfig::default()
        };
        let mut engineer = FeatureEngineer::new(config).unwrap();
        engineer
            .fit(&["fees fees hostel", "fees library", "hostel canteen"])
            .unwrap();
        assert_eq!(engineer.feature_names(), ["fees", "hostel"]);
    }

    #[test]
    fn test_document_frequency_pruning() {
        let config = FeatureConfig {
            min_df: 2,
            ngram_range: (1, 1),
            ..FeatureConfig::default()
        };
        let mut engineer = FeatureEngineer::new(config).unwrap();
        engineer.fit(&["fees hostel", "fees library"]).unwrap();
        assert_eq!(engineer.feature_names(), ["fees"]);

        let config = FeatureConfig {
            max_df: 0.5,
            ngram_range: (1, 1),
            ..FeatureConfig::default()
        };
        let mut engineer = FeatureEngineer::new(config).unwrap();
        engineer.fit(&["fees hostel", "fees library"]).unwrap();
        assert_eq!(engineer.feature_names(), ["hostel", "library"]);
    }

    #[test]
    fn test_english_stop_words_never_become_features() {
        let config = FeatureConfig {
            ngram_range: (1, 1),
            ..FeatureConfig::default()
        };
        let mut engineer = FeatureEngineer::new(config).unwrap();
        engineer
            .fit(&["how much is the tuition amount please", "please call the hostel"])
            .unwrap();
        assert_eq!(engineer.feature_names(), ["hostel", "tuition"]);

        assert!(engineer.fit(&["how much is the amount please", "please call me"]).is_err());
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let mut engineer = FeatureEngineer::new(FeatureConfig::default()).unwrap();
        assert!(engineer.fit(&["the and of", "a an"]).is_err());
        assert!(!engineer.is_fitted());

        let empty: [&str; 0] = [];
        assert!(matches!(
            engineer.fit(&empty),
            Err(AugurError::InsufficientTrainingData { .. })
        ));
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectorizer.bin");
        let engineer = fitted();
        engineer.persist(&path).unwrap();

        let restored = FeatureEngineer::from_artifact(&path).unwrap();
        assert_eq!(restored.feature_names(), engineer.feature_names());
        assert_eq!(restored.fingerprint(), engineer.fingerprint());
        assert_eq!(
            restored.transform_one("hostel fees").unwrap(),
            engineer.transform_one("hostel fees").unwrap()
        );
    }

    #[test]
    fn test_failed_restore_keeps_state() {
        let dir = TempDir::new().unwrap();
        let mut engineer = FeatureEngineer::new(FeatureConfig::default()).unwrap();
        assert!(engineer.restore(dir.path().join("missing.bin")).is_err());
        assert!(!engineer.is_fitted());
    }
}
