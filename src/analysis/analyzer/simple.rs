//! Word tokenization plus lowercasing, nothing removed.
//!
//! Backs [`AnalyzerCleaner::simple`](crate::analysis::cleaner::AnalyzerCleaner::simple).

use std::sync::Arc;

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::LowercaseFilter;
use crate::analysis::tokenizer::RegexTokenizer;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SimpleAnalyzer {
    pipeline: PipelineAnalyzer,
}

impl SimpleAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(SimpleAnalyzer {
            pipeline: PipelineAnalyzer::new(Arc::new(RegexTokenizer::new()?))
                .then(Arc::new(LowercaseFilter::new())),
        })
    }
}

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.pipeline.analyze(text)
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_stop_words_and_strips_punctuation() {
        let analyzer = SimpleAnalyzer::new().unwrap();
        assert_eq!(
            analyzer.terms("  What IS the fee?!").unwrap(),
            ["what", "is", "the", "fee"]
        );
    }
}
