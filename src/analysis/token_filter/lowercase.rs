//! Case folding.

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::TokenFilter;
use crate::error::Result;

/// Lowercases every token (Unicode-aware).
#[derive(Clone, Copy, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl TokenFilter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(tokens
            .into_iter()
            .map(|token| {
                if token.text.chars().any(char::is_uppercase) {
                    token.map_text(|text| text.to_lowercase())
                } else {
                    token
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
