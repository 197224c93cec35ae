//! Command line argument parsing for the dynsyn CLI using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Settings;
use crate::synonym::parser::SynonymFormat;

/// dynsyn - Hot-reloading synonym filters
#[derive(Parser, Debug, Clone)]
#[command(name = "dynsyn")]
#[command(about = "Build, check and watch hot-reloading synonym filters")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct DynsynArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Directory relative synonym paths are resolved against
    #[arg(long, env = "DYNSYN_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Timeout for remote synonym requests, in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl DynsynArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze text with a synonym filter built from a source
    Analyze(AnalyzeArgs),

    /// Parse a synonym source and report rules and errors
    Check(CheckArgs),

    /// Keep a filter live and re-analyze text after every reload
    Watch(WatchArgs),
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Analyze(_) => "analyze",
            Command::Check(_) => "check",
            Command::Watch(_) => "watch",
        }
    }
}

/// Options shared by every command that builds a synonym table.
#[derive(Args, Debug, Clone)]
pub struct RuleArgs {
    /// Synonym source: a file path or an http(s) URL
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Rule grammar
    #[arg(long, default_value = "solr")]
    pub rules_format: RulesFormat,

    /// Map every group term to the first term instead of to each other
    #[arg(long)]
    pub no_expand: bool,

    /// Skip malformed rule lines instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Tokenizer used for both rules and text
    #[arg(long, default_value = "standard")]
    pub tokenizer: TokenizerKind,

    /// Stem terms after lowercasing
    #[arg(long)]
    pub stem: bool,
}

impl RuleArgs {
    /// Filter settings equivalent to these options.
    pub fn settings(&self) -> Settings {
        Settings::new()
            .put("synonyms_path", &self.source)
            .put("expand", !self.no_expand)
            .put("lenient", self.lenient)
            .put("format", SynonymFormat::from(self.rules_format))
    }
}

/// Arguments for analyzing text
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// Text to analyze
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Emit flat output (every token spans one position)
    #[arg(long)]
    pub flat: bool,
}

/// Arguments for checking a synonym source
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// List every compiled entry
    #[arg(long)]
    pub entries: bool,
}

/// Arguments for watching a synonym source
#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// Text to re-analyze after each reload
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Seconds between change checks
    #[arg(short, long, default_value = "5")]
    pub interval: u64,

    /// Stop after this many reloads
    #[arg(long)]
    pub rounds: Option<u64>,

    /// Emit flat output (every token spans one position)
    #[arg(long)]
    pub flat: bool,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Rule grammars accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesFormat {
    Solr,
    Wordnet,
}

impl From<RulesFormat> for SynonymFormat {
    fn from(format: RulesFormat) -> Self {
        match format {
            RulesFormat::Solr => SynonymFormat::Solr,
            RulesFormat::Wordnet => SynonymFormat::Wordnet,
        }
    }
}

/// Tokenizers available on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    /// Unicode word boundaries, lowercased
    Standard,
    /// Whitespace only, lowercased
    Whitespace,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_analyze_command() {
        let args = DynsynArgs::try_parse_from([
            "dynsyn",
            "analyze",
            "synonym.txt",
            "a quick fox",
            "--lenient",
            "--flat",
        ])
        .unwrap();

        if let Command::Analyze(analyze_args) = args.command {
            assert_eq!(analyze_args.rules.source, "synonym.txt");
            assert_eq!(analyze_args.text, "a quick fox");
            assert!(analyze_args.rules.lenient);
            assert!(analyze_args.flat);
            assert_eq!(analyze_args.rules.tokenizer, TokenizerKind::Standard);
        } else {
            panic!("Expected Analyze command");
        }
    }

    #[test]
    fn test_watch_command() {
        let args = DynsynArgs::try_parse_from([
            "dynsyn",
            "watch",
            "https://example.com/synonym.txt",
            "quick",
            "--interval",
            "2",
            "--rounds",
            "3",
        ])
        .unwrap();

        if let Command::Watch(watch_args) = args.command {
            assert_eq!(watch_args.interval, 2);
            assert_eq!(watch_args.rounds, Some(3));
        } else {
            panic!("Expected Watch command");
        }
    }

    #[test]
    fn test_rule_settings() {
        let args = DynsynArgs::try_parse_from([
            "dynsyn",
            "check",
            "wn.pl",
            "--rules-format",
            "wordnet",
            "--no-expand",
        ])
        .unwrap();

        let Command::Check(check_args) = args.command else {
            panic!("Expected Check command");
        };
        let settings = check_args.rules.settings();
        assert_eq!(settings.get("format"), Some("wordnet"));
        assert_eq!(settings.get("expand"), Some("false"));
        assert_eq!(settings.get("lenient"), Some("false"));
    }

    #[test]
    fn test_command_name() {
        let args = DynsynArgs::try_parse_from(["dynsyn", "check", "s.txt"]).unwrap();
        assert_eq!(args.command.name(), "check");
    }

    #[test]
    fn test_verbosity() {
        let args = DynsynArgs::try_parse_from(["dynsyn", "-vv", "check", "s.txt"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = DynsynArgs::try_parse_from(["dynsyn", "-q", "-f", "json", "check", "s.txt"])
            .unwrap();
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
