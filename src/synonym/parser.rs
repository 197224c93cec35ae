//! Parsers for synonym rule text.
//!
//! Two formats are recognised:
//!
//! ```text
//! # solr (default)
//! quick, fast, rapid          group
//! ipod, i-pod => ipod, i pod  explicit mapping
//!
//! # wordnet
//! s(100000001,1,'abstain',v,1,0).
//! s(100000001,2,'refrain',v,1,0).
//! ```
//!
//! Parsing only splits lines into terms; normalising the terms is the job of
//! [`SynonymTableBuilder`](super::builder::SynonymTableBuilder).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynonymError};

const MAPPING_ARROW: &str = "=>";

static WORDNET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s\((\d+),\d+,'(.*)',\w+,\d+,\d+\)\.?\s*$").expect("static regex is valid")
});

/// Rule text grammar selected by the `format` setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynonymFormat {
    /// Comma separated groups and `=>` mappings.
    #[default]
    Solr,
    /// WordNet prolog `s(...)` facts.
    Wordnet,
}

impl SynonymFormat {
    /// Resolve a format name; the empty string selects the default format.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "solr" => Ok(SynonymFormat::Solr),
            "wordnet" => Ok(SynonymFormat::Wordnet),
            other => Err(SynonymError::config(format!(
                "unknown synonym format `{other}`, expected `solr` or `wordnet`"
            ))),
        }
    }

    /// The canonical name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            SynonymFormat::Solr => "solr",
            SynonymFormat::Wordnet => "wordnet",
        }
    }
}

impl fmt::Display for SynonymFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule as written in the source, before analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawRule {
    /// Equivalent terms: `a, b, c`.
    Group(Vec<String>),
    /// Directional mapping: `a, b => c, d`.
    Mapping {
        inputs: Vec<String>,
        outputs: Vec<String>,
    },
}

/// One parsed rule together with the (1-based) line it started on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleLine {
    pub line: usize,
    pub rule: std::result::Result<RawRule, String>,
}

/// Split rule text into rules. Blank lines and comment lines are skipped.
pub fn parse_rules(text: &str, format: SynonymFormat, comment_marker: &str) -> Vec<RuleLine> {
    let lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .filter(|(_, line)| comment_marker.is_empty() || !line.starts_with(comment_marker));

    match format {
        SynonymFormat::Solr => lines
            .map(|(line, content)| RuleLine {
                line,
                rule: parse_solr_line(content),
            })
            .collect(),
        SynonymFormat::Wordnet => parse_wordnet_lines(lines),
    }
}

fn parse_solr_line(line: &str) -> std::result::Result<RawRule, String> {
    let sides = split_escaped(line, MAPPING_ARROW, false);
    match sides.as_slice() {
        [group] => {
            let terms = split_terms(group);
            if terms.is_empty() {
                return Err("rule has no terms".to_string());
            }
            Ok(RawRule::Group(terms))
        }
        [left, right] => {
            let inputs = split_terms(left);
            let outputs = split_terms(right);
            if inputs.is_empty() || outputs.is_empty() {
                return Err(format!("mapping `{line}` has an empty side"));
            }
            Ok(RawRule::Mapping { inputs, outputs })
        }
        _ => Err("more than one explicit mapping specified on the same line".to_string()),
    }
}

fn split_terms(side: &str) -> Vec<String> {
    split_escaped(side, ",", true)
        .into_iter()
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect()
}

/// Split on `separator`, honouring backslash escapes.
///
/// With `unescape` the escape characters are dropped from the pieces;
/// otherwise they are kept so a later split can still see them.
fn split_escaped(text: &str, separator: &str, unescape: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if ch == '\\' {
            let mut chars = rest.chars();
            chars.next();
            match chars.next() {
                Some(escaped) => {
                    if !unescape {
                        current.push('\\');
                    }
                    current.push(escaped);
                    rest = &rest[1 + escaped.len_utf8()..];
                }
                None => {
                    current.push('\\');
                    rest = "";
                }
            }
        } else if rest.starts_with(separator) {
            pieces.push(std::mem::take(&mut current));
            rest = &rest[separator.len()..];
        } else {
            current.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    pieces.push(current);
    pieces
}

fn parse_wordnet_lines<'a, I>(lines: I) -> Vec<RuleLine>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut rules = Vec::new();
    let mut current: Option<(String, usize, Vec<String>)> = None;

    for (line, content) in lines {
        let Some(captures) = WORDNET_LINE.captures(content) else {
            rules.push(RuleLine {
                line,
                rule: Err(format!("`{content}` is not a wordnet synonym fact")),
            });
            continue;
        };
        let synset = captures[1].to_string();
        let word = captures[2].replace("''", "'");

        match current.as_mut() {
            Some((id, _, words)) if *id == synset => words.push(word),
            _ => {
                if let Some(group) = current.take() {
                    push_wordnet_group(&mut rules, group);
                }
                current = Some((synset, line, vec![word]));
            }
        }
    }
    if let Some(group) = current.take() {
        push_wordnet_group(&mut rules, group);
    }
    rules.sort_by_key(|rule| rule.line);
    rules
}

fn push_wordnet_group(rules: &mut Vec<RuleLine>, (_, line, words): (String, usize, Vec<String>)) {
    // A synset with a single word has nothing to map to.
    if words.len() > 1 {
        rules.push(RuleLine {
            line,
            rule: Ok(RawRule::Group(words)),
        });
    }
}
