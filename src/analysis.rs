//! Text analysis substrate for dynamic synonym filters.
//!
//! This module provides the tokenization and filtering pipeline that synonym
//! rules are normalized with and that the synonym filter finally rewrites.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
