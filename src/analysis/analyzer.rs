//! Analyzers: a tokenizer plus filters behind one trait.

mod analyzer;
mod english;
mod pipeline;
mod simple;

pub use analyzer::Analyzer;
pub use english::EnglishAnalyzer;
pub use pipeline::PipelineAnalyzer;
pub use simple::SimpleAnalyzer;
