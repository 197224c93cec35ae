//! Host-facing factory of dynamic synonym filters.
//!
//! A factory is created once per configured filter. It cannot filter on its
//! own: rule terms must be analyzed by the chain the filter sits in, so the
//! host first specializes it with [`DynamicSynonymFilterFactory::chain_aware`].
//! That call builds the first table synchronously and starts hot reloading.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dynamic_synonym::analysis::token_filter::Filter;
//! use dynamic_synonym::analysis::tokenizer::whitespace::WhitespaceTokenizer;
//! use dynamic_synonym::config::{AnalysisStage, ServiceConfig, Settings};
//! use dynamic_synonym::factory::{DynamicSynonymFilterFactory, FilterKind};
//! use dynamic_synonym::service::SynonymService;
//!
//! let service = SynonymService::new(ServiceConfig::default()).unwrap();
//! let settings = Settings::new().put("synonyms_path", "/etc/search/synonym.txt");
//! let factory = DynamicSynonymFilterFactory::new(
//!     service,
//!     "products",
//!     "synonyms",
//!     FilterKind::SynonymGraph,
//!     &settings,
//! )
//! .unwrap();
//!
//! let filter = factory
//!     .chain_aware(AnalysisStage::Search, Arc::new(WhitespaceTokenizer::new()), &[])
//!     .unwrap();
//! assert_eq!(filter.name(), "dynamic_synonym_graph");
//! ```

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::Tokenizer;
use crate::config::{AnalysisMode, AnalysisStage, Settings, SynonymFilterConfig};
use crate::error::{Result, SynonymError};
use crate::reload::task::ReloadTask;
use crate::service::SynonymService;
use crate::synonym::builder::SynonymTableBuilder;
use crate::synonym::graph::OutputMode;
use crate::synonym::stream::SynonymStream;

/// The registered filter types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Flat output; every token spans one position.
    Synonym,
    /// Graph output; multi-word synonyms carry position lengths.
    SynonymGraph,
}

impl FilterKind {
    /// Name the filter type is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Synonym => "dynamic_synonym",
            FilterKind::SynonymGraph => "dynamic_synonym_graph",
        }
    }

    /// Look a filter type up by its registered name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dynamic_synonym" => Some(FilterKind::Synonym),
            "dynamic_synonym_graph" => Some(FilterKind::SynonymGraph),
            _ => None,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        match self {
            FilterKind::Synonym => OutputMode::Flat,
            FilterKind::SynonymGraph => OutputMode::Graph,
        }
    }
}

/// Factory of one configured dynamic synonym filter.
pub struct DynamicSynonymFilterFactory {
    service: Arc<SynonymService>,
    index: String,
    name: String,
    kind: FilterKind,
    config: SynonymFilterConfig,
    task: Mutex<Option<Arc<ReloadTask>>>,
}

impl DynamicSynonymFilterFactory {
    /// Validate the filter settings. Invalid settings are fatal.
    pub fn new<I, N>(
        service: Arc<SynonymService>,
        index: I,
        name: N,
        kind: FilterKind,
        settings: &Settings,
    ) -> Result<Self>
    where
        I: Into<String>,
        N: Into<String>,
    {
        let config = SynonymFilterConfig::from_settings(settings)?;
        Ok(DynamicSynonymFilterFactory {
            service,
            index: index.into(),
            name: name.into(),
            kind,
            config,
            task: Mutex::new(None),
        })
    }

    /// Filtering without a chain is not supported.
    pub fn create(&self, _tokens: TokenStream) -> Result<TokenStream> {
        Err(SynonymError::analysis(format!(
            "token filter [{}] must be specialized for an analysis chain before use",
            self.name
        )))
    }

    /// Specialize the factory for an analysis chain.
    ///
    /// The first call builds the table with the chain's tokenizer and the
    /// filters preceding this one, and starts reloading it. Later calls share
    /// that table, whatever chain they come from.
    pub fn chain_aware(
        &self,
        stage: AnalysisStage,
        tokenizer: Arc<dyn Tokenizer>,
        previous: &[Arc<dyn Filter>],
    ) -> Result<DynamicSynonymFilter> {
        let mode = self.analysis_mode();
        if !mode.permits(stage) {
            return Err(SynonymError::config(format!(
                "token filter [{}] is updateable and may only be used in search analyzers, not at {stage:?} time",
                self.name
            )));
        }

        let mut slot = self.task.lock();
        let task = match slot.as_ref() {
            Some(task) => Arc::clone(task),
            None => {
                let task = Arc::new(self.bootstrap(tokenizer, previous)?);
                self.service.start(&task)?;
                *slot = Some(Arc::clone(&task));
                task
            }
        };

        Ok(DynamicSynonymFilter {
            task,
            kind: self.kind,
        })
    }

    fn bootstrap(
        &self,
        tokenizer: Arc<dyn Tokenizer>,
        previous: &[Arc<dyn Filter>],
    ) -> Result<ReloadTask> {
        let analyzer = PipelineAnalyzer::new(tokenizer)
            .add_filters(previous.iter().cloned())
            .with_name(format!("{}_rules", self.name));
        debug!(
            "building synonym rules of [{}/{}] with {analyzer:?}",
            self.index, self.name
        );

        let builder = SynonymTableBuilder::from_config(Arc::new(analyzer), &self.config);
        let source = self.service.open_source(&self.config.synonyms_path)?;
        ReloadTask::bootstrap(
            self.index.as_str(),
            self.name.as_str(),
            source,
            builder,
            self.config.interval(),
        )
    }

    /// The reload task, once the factory was specialized.
    pub fn task(&self) -> Option<Arc<ReloadTask>> {
        self.task.lock().clone()
    }

    /// Stop reloading. The last table stays in use.
    pub fn close(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| task.stop())
    }

    pub fn analysis_mode(&self) -> AnalysisMode {
        self.config.analysis_mode()
    }

    pub fn config(&self) -> &SynonymFilterConfig {
        &self.config
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for DynamicSynonymFilterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSynonymFilterFactory")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish()
    }
}

/// A dynamic synonym filter bound to its analysis chain.
#[derive(Clone, Debug)]
pub struct DynamicSynonymFilter {
    task: Arc<ReloadTask>,
    kind: FilterKind,
}

impl DynamicSynonymFilter {
    pub fn task(&self) -> &Arc<ReloadTask> {
        &self.task
    }
}

impl Filter for DynamicSynonymFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let table = self.task.live().load();
        if table.is_empty() {
            return Ok(tokens);
        }
        let consumer = self.task.consumers().attach(table);
        Ok(Box::new(SynonymStream::new(
            tokens,
            consumer,
            self.kind.output_mode(),
        )))
    }

    fn name(&self) -> &'static str {
        self.kind.name()
    }
}
