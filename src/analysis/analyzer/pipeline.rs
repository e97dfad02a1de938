//! Tokenizer followed by an ordered list of filters.

use std::fmt;
use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::TokenFilter;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// Runs a tokenizer, then each filter in the order added.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn TokenFilter>>,
    label: String,
}

impl PipelineAnalyzer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            label: tokenizer.name().to_string(),
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn then(mut self, filter: Arc<dyn TokenFilter>) -> Self {
        self.label.push('+');
        self.label.push_str(filter.name());
        self.filters.push(filter);
        self
    }

    /// Stage names joined with `+`, e.g. `regex+lowercase+stop`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.filters
            .iter()
            .try_fold(self.tokenizer.tokenize(text)?, |tokens, filter| {
                filter.filter(tokens)
            })
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PipelineAnalyzer").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token_filter::{LowercaseFilter, StopFilter};
    use crate::analysis::tokenizer::RegexTokenizer;

    #[test]
    fn test_filters_run_in_order() {
        let analyzer = PipelineAnalyzer::new(Arc::new(RegexTokenizer::new().unwrap()))
            .then(Arc::new(StopFilter::from_words(["the"])))
            .then(Arc::new(LowercaseFilter::new()));

        // "The" is only lowercased after the stop filter has run.
        let terms = analyzer.terms("The fee STRUCTURE the").unwrap();
        assert_eq!(terms, ["the", "fee", "structure"]);
        assert_eq!(analyzer.label(), "regex+stop+lowercase");
    }
}
