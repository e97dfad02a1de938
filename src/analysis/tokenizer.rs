//! Splitting raw text into tokens.

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Turns text into a token stream.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Short identifier, used in analyzer names and debug output.
    fn name(&self) -> &'static str;
}

pub mod regex;

pub use regex::RegexTokenizer;
