//! Token stream transformations.
//!
//! ```text
//! tokenizer -> lowercase -> stop words -> n-grams (vectorizer)
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Rewrites or drops tokens.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

pub mod lowercase;
pub mod stop;

pub use lowercase::LowercaseFilter;
pub use stop::StopFilter;
