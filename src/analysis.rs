//! Text analysis for Augur.
//!
//! Tokenizers split text into [`token::Token`]s, filters transform the token
//! stream, and analyzers chain the two. The vectorizer consumes analyzer
//! output; the [`cleaner`] module exposes the `clean(text) -> text` contract
//! applied to queries before vectorization.

pub mod analyzer;
pub mod cleaner;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::{Analyzer, EnglishAnalyzer, PipelineAnalyzer, SimpleAnalyzer};
pub use cleaner::{AnalyzerCleaner, IdentityCleaner, TextCleaner};
pub use token::{Token, TokenStream};
