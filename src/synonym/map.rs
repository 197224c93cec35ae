//! Compiled synonym table.
//!
//! Uses an FST (Finite State Transducer) keyed by the analyzed input phrase for
//! memory-efficient storage and fast lookup. A phrase is stored as its words
//! joined by [`WORD_SEPARATOR`]; the FST value indexes into the output lists.

use std::collections::BTreeMap;
use std::fmt;

use fst::{Map, MapBuilder, Streamer};

use crate::error::{Result, SynonymError};

/// Separator between the words of a multi-word phrase inside FST keys.
pub const WORD_SEPARATOR: char = '\u{0}';

/// Immutable snapshot of compiled synonym rules.
///
/// An empty map means "no synonyms configured"; filters pass tokens through.
#[derive(Clone)]
pub struct SynonymMap {
    fst: Option<Map<Vec<u8>>>,
    /// Output phrases (each a list of words) indexed by FST values
    outputs: Vec<Vec<Vec<String>>>,
    /// Longest input phrase, in words
    max_input_words: usize,
}

impl SynonymMap {
    /// A map without any rules.
    pub fn empty() -> Self {
        SynonymMap {
            fst: None,
            outputs: Vec::new(),
            max_input_words: 0,
        }
    }

    /// Whether the map has no rules at all.
    pub fn is_empty(&self) -> bool {
        self.fst.is_none()
    }

    /// Number of distinct input phrases.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Longest input phrase, in words.
    pub fn max_input_words(&self) -> usize {
        self.max_input_words
    }

    /// Look up the output phrases for an analyzed input phrase.
    pub fn lookup<S: AsRef<str>>(&self, words: &[S]) -> Option<&[Vec<String>]> {
        let fst = self.fst.as_ref()?;
        if words.is_empty() || words.len() > self.max_input_words {
            return None;
        }
        let index = fst.get(join_words(words).as_bytes())? as usize;
        self.outputs.get(index).map(Vec::as_slice)
    }

    /// All rules in key order, as (input words, output phrases).
    pub fn entries(&self) -> Vec<(Vec<String>, Vec<Vec<String>>)> {
        let Some(fst) = self.fst.as_ref() else {
            return Vec::new();
        };

        let mut entries = Vec::with_capacity(self.outputs.len());
        let mut stream = fst.stream();
        while let Some((key, index)) = stream.next() {
            let input = String::from_utf8_lossy(key)
                .split(WORD_SEPARATOR)
                .map(str::to_string)
                .collect();
            if let Some(outputs) = self.outputs.get(index as usize) {
                entries.push((input, outputs.clone()));
            }
        }
        entries
    }
}

impl Default for SynonymMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for SynonymMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries() == other.entries()
    }
}

impl fmt::Debug for SynonymMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynonymMap")
            .field("entries", &self.len())
            .field("max_input_words", &self.max_input_words)
            .finish()
    }
}

fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    let mut key = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            key.push(WORD_SEPARATOR);
        }
        key.push_str(word.as_ref());
    }
    key
}

/// Check that a pair of analyzed phrases can be stored in a map.
pub fn validate_pair(input: &[String], output: &[String]) -> Result<()> {
    if input.is_empty() || output.is_empty() {
        return Err(SynonymError::build("synonym phrases must not be empty"));
    }
    if input
        .iter()
        .chain(output.iter())
        .any(|word| word.is_empty() || word.contains(WORD_SEPARATOR))
    {
        return Err(SynonymError::build(
            "synonym words must be non-empty and free of NUL characters",
        ));
    }
    Ok(())
}

/// Accumulates rules and compiles them into a [`SynonymMap`].
///
/// Outputs for the same input are merged and de-duplicated in insertion order,
/// and keys are emitted in sorted order, so identical rules always compile to
/// identical maps.
#[derive(Debug, Default)]
pub struct SynonymMapBuilder {
    entries: BTreeMap<String, Vec<Vec<String>>>,
    max_input_words: usize,
}

impl SynonymMapBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an analyzed input phrase to an analyzed output phrase.
    pub fn add(&mut self, input: &[String], output: &[String]) -> Result<()> {
        validate_pair(input, output)?;
        self.max_input_words = self.max_input_words.max(input.len());
        let outputs = self.entries.entry(join_words(input)).or_default();
        if !outputs.iter().any(|existing| existing.as_slice() == output) {
            outputs.push(output.to_vec());
        }
        Ok(())
    }

    /// Number of distinct inputs added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rule has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile the accumulated rules.
    pub fn build(self) -> Result<SynonymMap> {
        if self.entries.is_empty() {
            return Ok(SynonymMap::empty());
        }

        let mut builder = MapBuilder::memory();
        let mut outputs = Vec::with_capacity(self.entries.len());
        for (key, phrases) in self.entries {
            builder
                .insert(key.as_bytes(), outputs.len() as u64)
                .map_err(|e| SynonymError::build(format!("FST build error: {e}")))?;
            outputs.push(phrases);
        }

        let bytes = builder
            .into_inner()
            .map_err(|e| SynonymError::build(format!("FST finalize error: {e}")))?;
        let fst = Map::new(bytes)
            .map_err(|e| SynonymError::build(format!("FST creation error: {e}")))?;

        Ok(SynonymMap {
            fst: Some(fst),
            outputs,
            max_input_words: self.max_input_words,
        })
    }
}
