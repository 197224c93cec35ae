//! Token filter implementations for token transformation.
//!
//! Filters placed before a synonym filter also normalize the synonym rules,
//! so a lowercasing or stemming chain is honored consistently on both sides:
//!
//! ```text
//! Tokenizer → Lowercase → Stem → DynamicSynonym → Index
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for filters that transform token streams.
///
/// # Examples
///
/// ```
/// use dynamic_synonym::analysis::token::Token;
/// use dynamic_synonym::analysis::token_filter::Filter;
/// use dynamic_synonym::analysis::token_filter::lowercase::LowercaseFilter;
///
/// let filter = LowercaseFilter::new();
/// let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1)];
/// let filtered: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
///     .unwrap()
///     .collect();
///
/// assert_eq!(filtered[0].text, "hello");
/// assert_eq!(filtered[1].text, "world");
/// ```
pub trait Filter: Send + Sync {
    /// Apply this filter to a token stream.
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// Get the name of this filter (for debugging and configuration).
    fn name(&self) -> &'static str;
}

pub mod lowercase;
pub mod stem;

pub use lowercase::LowercaseFilter;
pub use stem::{SimpleStemmer, StemFilter, Stemmer};
