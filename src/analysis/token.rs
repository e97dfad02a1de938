//! Tokens produced by query analysis.
//!
//! ```
//! use augur::analysis::token::Token;
//!
//! let token = Token::spanning("Tuition", 1, 9..16);
//! assert_eq!(token.text, "Tuition");
//! assert_eq!(token.span(), 9..16);
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A word found in a query, with its ordinal and byte span in the input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Ordinal among the tokens the tokenizer emitted.
    pub position: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Token {
    /// A token with no source span.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Self::spanning(text, position, 0..0)
    }

    pub fn spanning<S: Into<String>>(text: S, position: usize, span: Range<usize>) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: span.start,
            end_offset: span.end,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }

    /// Replace the text, keeping position and span.
    pub fn map_text<F: FnOnce(String) -> String>(self, f: F) -> Self {
        Token {
            text: f(self.text),
            ..self
        }
    }
}

/// Tokens in emission order. Filters consume and return whole streams.
pub type TokenStream = Vec<Token>;
