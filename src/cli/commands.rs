//! Command implementations for the dynsyn CLI.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::Token;
use crate::analysis::token_filter::{Filter, LowercaseFilter, StemFilter};
use crate::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer, WhitespaceTokenizer};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{AnalysisStage, ServiceConfig, SynonymFilterConfig};
use crate::error::{Result, SynonymError};
use crate::factory::{DynamicSynonymFilter, DynamicSynonymFilterFactory, FilterKind};
use crate::reload::source::open_source;
use crate::service::SynonymService;
use crate::synonym::builder::SynonymTableBuilder;

/// How often `watch` looks for a newly published table.
const WATCH_POLL: Duration = Duration::from_millis(100);

/// Execute a CLI command.
pub fn execute_command(args: DynsynArgs) -> Result<()> {
    match &args.command {
        Command::Analyze(analyze_args) => analyze(analyze_args, &args),
        Command::Check(check_args) => check(check_args, &args),
        Command::Watch(watch_args) => watch(watch_args, &args),
    }
}

/// The tokenizer and filters that precede the synonym filter.
struct Chain {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
}

impl Chain {
    fn from_args(rules: &RuleArgs) -> Self {
        let tokenizer: Arc<dyn Tokenizer> = match rules.tokenizer {
            TokenizerKind::Standard => Arc::new(UnicodeWordTokenizer::new()),
            TokenizerKind::Whitespace => Arc::new(WhitespaceTokenizer::new()),
        };
        let mut filters: Vec<Arc<dyn Filter>> = vec![Arc::new(LowercaseFilter::new())];
        if rules.stem {
            filters.push(Arc::new(StemFilter::new()));
        }
        Chain { tokenizer, filters }
    }

    fn analyzer(&self) -> PipelineAnalyzer {
        PipelineAnalyzer::new(Arc::clone(&self.tokenizer))
            .add_filters(self.filters.iter().cloned())
            .with_name("cli_rules")
    }

    fn run(&self, synonyms: &DynamicSynonymFilter, text: &str) -> Result<Vec<Token>> {
        let mut tokens = self.tokenizer.tokenize(text)?;
        for filter in &self.filters {
            tokens = filter.filter(tokens)?;
        }
        Ok(synonyms.filter(tokens)?.collect())
    }
}

fn service_config(args: &DynsynArgs) -> ServiceConfig {
    ServiceConfig {
        config_dir: args.config_dir.clone(),
        fetch_timeout_secs: args.timeout,
        ..ServiceConfig::default()
    }
}

fn filter_kind(flat: bool) -> FilterKind {
    if flat {
        FilterKind::Synonym
    } else {
        FilterKind::SynonymGraph
    }
}

/// Build a filter once and analyze text with it.
fn analyze(args: &AnalyzeArgs, cli_args: &DynsynArgs) -> Result<()> {
    let service = SynonymService::new(service_config(cli_args))?;
    let chain = Chain::from_args(&args.rules);
    let factory = DynamicSynonymFilterFactory::new(
        Arc::clone(&service),
        "cli",
        "dynsyn",
        filter_kind(args.flat),
        &args.rules.settings(),
    )?;

    let filter = factory.chain_aware(
        AnalysisStage::Search,
        Arc::clone(&chain.tokenizer),
        &chain.filters,
    )?;
    let tokens = chain.run(&filter, &args.text)?;

    output_result(
        &format!("Analyzed with synonyms from {}", args.rules.source),
        &AnalysisResult {
            source: filter.task().location().to_string(),
            entries: filter.task().live().load().len(),
            tokens,
        },
        cli_args,
    )?;

    service.shutdown();
    Ok(())
}

/// Parse and compile a source, reporting every rule line that does not build.
fn check(args: &CheckArgs, cli_args: &DynsynArgs) -> Result<()> {
    let config = SynonymFilterConfig::from_settings(&args.rules.settings())?;
    let source = open_source(
        &config.synonyms_path,
        cli_args.config_dir.as_deref(),
        Duration::from_secs(cli_args.timeout.max(1)),
    )?;
    let raw = source.fetch()?;

    let chain = Chain::from_args(&args.rules);
    let report = SynonymTableBuilder::from_config(Arc::new(chain.analyzer()), &config)
        .lenient(true)
        .build_report(&raw)?;

    let table = args.entries.then(|| {
        report
            .map
            .entries()
            .into_iter()
            .map(|(input, outputs)| EntryOutput {
                input: input.join(" "),
                outputs: outputs.iter().map(|phrase| phrase.join(" ")).collect(),
            })
            .collect()
    });

    let skipped = report.skipped.len();
    output_result(
        &format!("Checked {}", source.location()),
        &CheckResult {
            source: source.location().to_string(),
            format: config.format.to_string(),
            rules: report.rules,
            entries: report.map.len(),
            max_input_words: report.map.max_input_words(),
            skipped: report.skipped,
            table,
        },
        cli_args,
    )?;

    if skipped > 0 && !config.lenient {
        return Err(SynonymError::build(format!(
            "{skipped} invalid synonym rule line(s) in {}",
            source.location()
        )));
    }
    Ok(())
}

/// Keep a filter live and print the analysis again after each reload.
fn watch(args: &WatchArgs, cli_args: &DynsynArgs) -> Result<()> {
    let service = SynonymService::new(service_config(cli_args))?;
    let chain = Chain::from_args(&args.rules);
    let settings = args.rules.settings().put("interval", args.interval);
    let factory = DynamicSynonymFilterFactory::new(
        Arc::clone(&service),
        "cli",
        "dynsyn",
        filter_kind(args.flat),
        &settings,
    )?;
    let filter = factory.chain_aware(
        AnalysisStage::Search,
        Arc::clone(&chain.tokenizer),
        &chain.filters,
    )?;
    let task = Arc::clone(filter.task());
    info!(
        "watching {} every {}s",
        task.location(),
        task.interval().as_secs()
    );

    let mut round = 0;
    let mut version = task.live().version();
    loop {
        output_result(
            &format!("Round {round}"),
            &WatchRound {
                round,
                version,
                entries: task.live().load().len(),
                tokens: chain.run(&filter, &args.text)?,
            },
            cli_args,
        )?;

        if args.rounds.is_some_and(|rounds| round >= rounds) {
            break;
        }
        while task.live().version() == version {
            thread::sleep(WATCH_POLL);
        }
        version = task.live().version();
        round += 1;
        debug!("observed table version {version}");
    }

    factory.close();
    service.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_chain_from_args() {
        let args =
            DynsynArgs::try_parse_from(["dynsyn", "check", "s.txt", "--stem", "--tokenizer", "whitespace"])
                .unwrap();
        let Command::Check(check_args) = args.command else {
            panic!("Expected Check command");
        };

        let chain = Chain::from_args(&check_args.rules);
        assert_eq!(chain.tokenizer.name(), "whitespace");
        assert_eq!(chain.filters.len(), 2);
        assert_eq!(chain.filters[1].name(), "stem");
    }

    #[test]
    fn test_filter_kind() {
        assert_eq!(filter_kind(true), FilterKind::Synonym);
        assert_eq!(filter_kind(false), FilterKind::SynonymGraph);
    }
}
