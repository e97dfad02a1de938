//! Training corpus: intents and the pattern texts that exemplify them.
//!
//! On disk the corpus is a JSON array of objects with an `intent` label and
//! a `patterns` list. Any other fields (responses, tags, ...) are carried
//! through untouched so augmentation rewrites the file in the same shape.

use std::collections::HashSet;
use std::path::Path;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};
use crate::util::fs::write_json_atomic;

/// One labelled training text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub intent: String,
}

impl TrainingExample {
    pub fn new<T: Into<String>, I: Into<String>>(text: T, intent: I) -> Self {
        Self {
            text: text.into(),
            intent: intent.into(),
        }
    }
}

/// An intent with its ordered, deduplicated patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPatterns {
    pub intent: String,
    pub patterns: Vec<String>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IntentPatterns {
    pub fn new<S: Into<String>>(intent: S, patterns: Vec<String>) -> Self {
        Self {
            intent: intent.into(),
            patterns,
            extra: serde_json::Map::new(),
        }
    }

    /// Drop repeated patterns, keeping the first occurrence.
    fn dedup(&mut self) -> usize {
        let before = self.patterns.len();
        let mut seen = HashSet::new();
        self.patterns.retain(|p| seen.insert(p.clone()));
        before - self.patterns.len()
    }
}

/// The full training corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingCorpus {
    intents: Vec<IntentPatterns>,
}

impl TrainingCorpus {
    /// Build a corpus from intents, deduplicating and validating them.
    pub fn from_intents(mut intents: Vec<IntentPatterns>) -> Result<Self> {
        for intent in &mut intents {
            let removed = intent.dedup();
            if removed > 0 {
                log::debug!(
                    "Dropped {removed} duplicate patterns from intent '{}'",
                    intent.intent
                );
            }
        }
        let corpus = Self { intents };
        corpus.validate()?;
        Ok(corpus)
    }

    /// Convenience constructor from `(intent, patterns)` pairs.
    pub fn from_pairs<I, S, P>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<P>)>,
        S: Into<String>,
        P: Into<String>,
    {
        let intents = pairs
            .into_iter()
            .map(|(intent, patterns)| {
                IntentPatterns::new(intent, patterns.into_iter().map(Into::into).collect())
            })
            .collect();
        Self::from_intents(intents)
    }

    /// Load a corpus file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AugurError::corpus(format!("cannot read {}: {e}", path.display()))
        })?;
        let intents: Vec<IntentPatterns> = serde_json::from_str(&content)
            .map_err(|e| AugurError::corpus(format!("malformed {}: {e}", path.display())))?;
        let corpus = Self::from_intents(intents)?;
        log::info!(
            "Loaded corpus {} ({} intents, {} patterns)",
            path.display(),
            corpus.len(),
            corpus.pattern_count()
        );
        Ok(corpus)
    }

    /// Rewrite the corpus file in place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        write_json_atomic(path, &self.intents).map_err(|e| {
            AugurError::serialization(format!("cannot write corpus {}: {e}", path.display()))
        })?;
        log::debug!("Saved corpus to {}", path.display());
        Ok(())
    }

    /// Every intent must own at least one pattern and appear only once.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for intent in &self.intents {
            if intent.intent.is_empty() {
                return Err(AugurError::corpus("intent label cannot be empty"));
            }
            if !names.insert(intent.intent.as_str()) {
                return Err(AugurError::corpus(format!(
                    "intent '{}' is declared twice",
                    intent.intent
                )));
            }
            if intent.patterns.is_empty() {
                return Err(AugurError::corpus(format!(
                    "intent '{}' has no patterns",
                    intent.intent
                )));
            }
        }
        Ok(())
    }

    pub fn intents(&self) -> &[IntentPatterns] {
        &self.intents
    }

    /// Intent labels in corpus order.
    pub fn intent_names(&self) -> Vec<&str> {
        self.intents.iter().map(|i| i.intent.as_str()).collect()
    }

    pub fn patterns(&self, intent: &str) -> Option<&[String]> {
        self.intents
            .iter()
            .find(|i| i.intent == intent)
            .map(|i| i.patterns.as_slice())
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn pattern_count(&self) -> usize {
        self.intents.iter().map(|i| i.patterns.len()).sum()
    }

    /// Flatten into `(text, intent)` examples in corpus order.
    pub fn examples(&self) -> Vec<TrainingExample> {
        self.intents
            .iter()
            .flat_map(|i| {
                i.patterns
                    .iter()
                    .map(move |p| TrainingExample::new(p.clone(), i.intent.clone()))
            })
            .collect()
    }

    /// Append `query` to `intent` unless it is already a pattern.
    ///
    /// Returns `false` when the intent is unknown or the pattern exists.
    pub fn augment(&mut self, query: &str, intent: &str) -> bool {
        let Some(entry) = self.intents.iter_mut().find(|i| i.intent == intent) else {
            return false;
        };
        if entry.patterns.iter().any(|p| p == query) {
            return false;
        }
        entry.patterns.push(query.to_string());
        true
    }

    /// Shuffle the examples and split off `test_ratio` of them.
    ///
    /// Both halves are non-empty whenever the corpus holds two or more
    /// examples. The split is reproducible for a given `seed`.
    pub fn split(
        &self,
        test_ratio: f64,
        seed: u64,
    ) -> Result<(Vec<TrainingExample>, Vec<TrainingExample>)> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(AugurError::invalid_config(format!(
                "test ratio {test_ratio} must be in (0, 1)"
            )));
        }
        let mut examples = self.examples();
        if examples.len() < 2 {
            return Err(AugurError::InsufficientTrainingData {
                min_samples: 2,
                actual: examples.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        examples.shuffle(&mut rng);

        let n = examples.len();
        let test_len = ((n as f64) * test_ratio).round() as usize;
        let test_len = test_len.clamp(1, n - 1);
        let test = examples.split_off(n - test_len);
        Ok((examples, test))
    }
}
