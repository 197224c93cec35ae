//! # Dynamic Synonym
//!
//! Synonym token filters whose rules are reloaded at runtime, from a local
//! file or an HTTP(S) URL, without restarting the host or reopening indices.
//!
//! ## Features
//!
//! - Solr and WordNet rule formats, with expand and lenient policies
//! - FST-backed tables with greedy longest-match rewriting
//! - Flat and graph token output
//! - Lock-free table publication to concurrent analysis streams
//! - A single background worker polling every configuration
//! - Conditional HTTP checks using `Last-Modified` and `ETag`
//! - Index lifecycle hooks that stop reloading for removed indices

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod reload;
pub mod service;
pub mod synonym;

pub mod prelude {
    pub use crate::config::{AnalysisStage, ServiceConfig, Settings, SynonymFilterConfig};
    pub use crate::error::{Result, SynonymError};
    pub use crate::factory::{DynamicSynonymFilter, DynamicSynonymFilterFactory, FilterKind};
    pub use crate::service::{IndexEvent, SynonymService};
    pub use crate::synonym::{OutputMode, SynonymFormat, SynonymMap, SynonymTableBuilder};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
