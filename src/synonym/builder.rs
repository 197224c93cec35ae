//! Builds a [`SynonymMap`] from raw rule text.
//!
//! Every term on either side of a rule is run through the analyzer of the
//! chain the synonym filter sits in, so lowercasing or stemming applied to
//! the indexed text applies to the rules as well.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::analysis::analyzer::Analyzer;
use crate::config::SynonymFilterConfig;
use crate::error::{Result, SynonymError};

use super::map::{SynonymMap, SynonymMapBuilder, validate_pair};
use super::parser::{RawRule, RuleLine, SynonymFormat, parse_rules};

/// Default prefix of comment lines in rule text.
pub const DEFAULT_COMMENT_MARKER: &str = "#";

/// A rule line that a lenient build left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub line: usize,
    pub reason: String,
}

/// Outcome of a build: the map plus whatever a lenient build skipped.
#[derive(Debug)]
pub struct BuildReport {
    pub map: SynonymMap,
    pub rules: usize,
    pub skipped: Vec<SkippedRule>,
}

/// An analyzed rule, ready to be added to the map builder in one step.
struct PreparedRule {
    pairs: Vec<(Vec<String>, Vec<String>)>,
}

/// Turns rule text into compiled synonym tables under an expand/lenient policy.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use dynamic_synonym::analysis::analyzer::standard::StandardAnalyzer;
/// use dynamic_synonym::synonym::builder::SynonymTableBuilder;
///
/// let builder = SynonymTableBuilder::new(Arc::new(StandardAnalyzer::new()));
/// let map = builder.build("Quick, Fast").unwrap();
///
/// assert_eq!(map.lookup(&["quick"]).unwrap().len(), 2);
/// ```
#[derive(Clone)]
pub struct SynonymTableBuilder {
    analyzer: Arc<dyn Analyzer>,
    expand: bool,
    lenient: bool,
    format: SynonymFormat,
    comment_marker: String,
}

impl SynonymTableBuilder {
    /// Create a builder with the default policy: expand, strict, solr format.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        SynonymTableBuilder {
            analyzer,
            expand: true,
            lenient: false,
            format: SynonymFormat::Solr,
            comment_marker: DEFAULT_COMMENT_MARKER.to_string(),
        }
    }

    /// Create a builder following a filter configuration.
    pub fn from_config(analyzer: Arc<dyn Analyzer>, config: &SynonymFilterConfig) -> Self {
        Self::new(analyzer)
            .expand(config.expand)
            .lenient(config.lenient)
            .format(config.format)
    }

    /// Treat groups as mutually equivalent (`true`) or as mapping to their first term.
    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    /// Skip malformed rule lines instead of failing the build.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Select the rule grammar.
    pub fn format(mut self, format: SynonymFormat) -> Self {
        self.format = format;
        self
    }

    /// Change the prefix that marks comment lines.
    pub fn with_comment_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.comment_marker = marker.into();
        self
    }

    /// Whether malformed lines are skipped.
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Compile rule text into a synonym map.
    pub fn build(&self, raw: &str) -> Result<SynonymMap> {
        self.build_report(raw).map(|report| report.map)
    }

    /// Compile rule text, also returning the lines a lenient build skipped.
    pub fn build_report(&self, raw: &str) -> Result<BuildReport> {
        let mut map = SynonymMapBuilder::new();
        let mut rules = 0;
        let mut skipped = Vec::new();

        for RuleLine { line, rule } in parse_rules(raw, self.format, &self.comment_marker) {
            let prepared = rule.and_then(|rule| self.prepare(rule));
            match prepared {
                Ok(prepared) => {
                    for (input, output) in &prepared.pairs {
                        map.add(input, output)?;
                    }
                    rules += 1;
                }
                Err(reason) if self.lenient => {
                    warn!("skipping synonym rule at line {line}: {reason}");
                    skipped.push(SkippedRule { line, reason });
                }
                Err(reason) => {
                    return Err(SynonymError::build(format!(
                        "invalid synonym rule at line {line}: {reason}"
                    )));
                }
            }
        }

        let map = map.build()?;
        debug!(
            "built synonym map with {} rules ({} entries, {} skipped)",
            rules,
            map.len(),
            skipped.len()
        );
        Ok(BuildReport {
            map,
            rules,
            skipped,
        })
    }

    /// Run one term through the analyzer, returning its words.
    pub fn analyze_term(&self, term: &str) -> Result<Vec<String>> {
        let words: Vec<String> = self
            .analyzer
            .analyze(term)?
            .map(|token| token.text)
            .filter(|word| !word.is_empty())
            .collect();
        if words.is_empty() {
            return Err(SynonymError::analysis(format!(
                "term `{term}` was completely eliminated by analyzer `{}`",
                self.analyzer.name()
            )));
        }
        Ok(words)
    }

    fn prepare(&self, rule: RawRule) -> std::result::Result<PreparedRule, String> {
        let analyze_all = |terms: &[String]| -> std::result::Result<Vec<Vec<String>>, String> {
            terms
                .iter()
                .map(|term| self.analyze_term(term).map_err(|e| e.to_string()))
                .collect()
        };

        let mut pairs = Vec::new();
        match rule {
            RawRule::Group(terms) => {
                let terms = analyze_all(&terms)?;
                let targets: &[Vec<String>] = if self.expand { &terms } else { &terms[..1] };
                for input in &terms {
                    for output in targets {
                        pairs.push((input.clone(), output.clone()));
                    }
                }
            }
            RawRule::Mapping { inputs, outputs } => {
                let inputs = analyze_all(&inputs)?;
                let outputs = analyze_all(&outputs)?;
                for input in &inputs {
                    for output in &outputs {
                        pairs.push((input.clone(), output.clone()));
                    }
                }
            }
        }
        for (input, output) in &pairs {
            validate_pair(input, output).map_err(|e| e.to_string())?;
        }
        Ok(PreparedRule { pairs })
    }
}

impl std::fmt::Debug for SynonymTableBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynonymTableBuilder")
            .field("analyzer", &self.analyzer.name())
            .field("expand", &self.expand)
            .field("lenient", &self.lenient)
            .field("format", &self.format)
            .field("comment_marker", &self.comment_marker)
            .finish()
    }
}
