//! Query cleaning contract.
//!
//! Raw text cleaning lives outside the learning loop; everything in Augur
//! depends only on [`TextCleaner::clean`], a deterministic pure function.
//! The same cleaner must be used at training and serving time, otherwise
//! the vocabulary sees different surface forms than live queries.

use std::fmt;
use std::sync::Arc;

use crate::analysis::analyzer::{Analyzer, SimpleAnalyzer};
use crate::error::Result;

/// Deterministic text normalisation applied before vectorization.
pub trait TextCleaner: Send + Sync {
    /// Return the cleaned form of `text`. Must not fail.
    fn clean(&self, text: &str) -> String;
}

/// Passes text through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCleaner;

impl TextCleaner for IdentityCleaner {
    fn clean(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Cleans text by running it through an analyzer and re-joining the
/// surviving tokens with single spaces.
///
/// With the default [`SimpleAnalyzer`] this lowercases, strips punctuation
/// and collapses whitespace.
#[derive(Clone)]
pub struct AnalyzerCleaner {
    analyzer: Arc<dyn Analyzer>,
}

impl AnalyzerCleaner {
    /// Cleaner backed by the given analyzer.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    /// Cleaner backed by a [`SimpleAnalyzer`].
    pub fn simple() -> Result<Self> {
        Ok(Self::new(Arc::new(SimpleAnalyzer::new()?)))
    }
}

impl TextCleaner for AnalyzerCleaner {
    fn clean(&self, text: &str) -> String {
        match self.analyzer.terms(text) {
            Ok(terms) => terms.join(" "),
            Err(e) => {
                log::warn!("Cleaning with {} failed, using raw text: {e}", self.analyzer.name());
                text.trim().to_string()
            }
        }
    }
}

impl fmt::Debug for AnalyzerCleaner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerCleaner")
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}
