//! Synonym rules: parsing, compilation and token rewriting.
//!
//! # Components
//!
//! - [`parser`] - Splits rule text (solr or wordnet format) into raw rules
//! - [`builder`] - Analyzes raw rules and compiles them under the expand/lenient policy
//! - [`map`] - The compiled, immutable FST-backed table
//! - [`graph`] - Longest-match rewriting of a token sequence
//! - [`stream`] - The per-stream consumer used by the dynamic filter
//!
//! ```text
//! Input: "a quick fox"
//! With group: quick, fast
//!
//!   Position 0: "a"
//!   Position 1: "quick" ──┐
//!   Position 1: "fast"  ──┴──> Position 2: "fox"
//! ```

pub mod builder;
pub mod graph;
pub mod map;
pub mod parser;
pub mod stream;

pub use builder::SynonymTableBuilder;
pub use graph::OutputMode;
pub use map::{SynonymMap, SynonymMapBuilder};
pub use parser::SynonymFormat;
pub use stream::SynonymStream;
