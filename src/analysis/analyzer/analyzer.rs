//! The analyzer contract.

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Converts text into the tokens the vectorizer counts.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Stable identifier.
    ///
    /// The vectorizer records this name in its artifact and warns when an
    /// artifact is restored under a different analyzer.
    fn name(&self) -> &'static str;

    /// Token texts only.
    fn terms(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.into_iter().map(|t| t.text).collect())
    }
}
