//! The vectorizer's default analyzer.

use std::sync::Arc;

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::{LowercaseFilter, StopFilter};
use crate::analysis::tokenizer::RegexTokenizer;
use crate::error::Result;

/// Two-plus character words, lowercased, English stop words removed.
#[derive(Clone, Debug)]
pub struct EnglishAnalyzer {
    pipeline: PipelineAnalyzer,
}

impl EnglishAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(EnglishAnalyzer {
            pipeline: PipelineAnalyzer::new(Arc::new(RegexTokenizer::words()?))
                .then(Arc::new(LowercaseFilter::new()))
                .then(Arc::new(StopFilter::english())),
        })
    }
}

impl Analyzer for EnglishAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.pipeline.analyze(text)
    }

    fn name(&self) -> &'static str {
        "english"
    }
}
