//! Tokenizers split raw text into an initial token stream.
//!
//! Both the analysis chain and the synonym rule builder start from the same
//! tokenizer, which is what keeps rule terms and indexed terms comparable.

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
///
/// The trait requires `Send + Sync` so one tokenizer can be shared between the
/// analysis chain and the background reload worker.
///
/// # Examples
///
/// ```
/// use dynamic_synonym::analysis::tokenizer::Tokenizer;
/// use dynamic_synonym::analysis::tokenizer::whitespace::WhitespaceTokenizer;
///
/// let tokenizer = WhitespaceTokenizer::new();
/// let tokens: Vec<_> = tokenizer.tokenize("Hello world").unwrap().collect();
/// assert_eq!(tokens[0].text, "Hello");
/// assert_eq!(tokens[1].text, "world");
/// ```
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a stream of tokens.
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}

pub mod unicode_word;
pub mod whitespace;

pub use unicode_word::UnicodeWordTokenizer;
pub use whitespace::WhitespaceTokenizer;
