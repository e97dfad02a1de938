//! Tokenization by regular expression matches.

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{AugurError, Result};

/// Any run of word characters.
pub const ANY_WORD_PATTERN: &str = r"\w+";

/// Words of two or more word characters; single letters and digits are
/// dropped.
pub const WORD_PATTERN: &str = r"\b\w\w+\b";

/// Emits one token per non-overlapping match of a pattern.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
}

impl RegexTokenizer {
    /// Tokenizer over [`ANY_WORD_PATTERN`].
    pub fn new() -> Result<Self> {
        Self::with_pattern(ANY_WORD_PATTERN)
    }

    /// Tokenizer over [`WORD_PATTERN`].
    pub fn words() -> Result<Self> {
        Self::with_pattern(WORD_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            AugurError::invalid_config(format!("invalid token pattern {pattern:?}: {e}"))
        })?;
        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        Ok(self
            .pattern
            .find_iter(text)
            .enumerate()
            .map(|(i, m)| Token::spanning(m.as_str(), i, m.range()))
            .collect())
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}
