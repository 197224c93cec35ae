//! Token rewriting with a compiled [`SynonymMap`].
//!
//! Matching is greedy longest-match: at each position the longest input phrase
//! found in the map wins, and its output phrases are stacked on the positions
//! of the matched tokens.

use serde::{Deserialize, Serialize};

use crate::analysis::token::{Token, TokenType};

use super::map::SynonymMap;

/// Shape of the rewritten token stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Every token spans exactly one position.
    Flat,
    /// Synonyms carry `position_length` so multi-word alternatives form a graph.
    #[default]
    Graph,
}

impl SynonymMap {
    /// Rewrite a token sequence, injecting synonyms.
    ///
    /// Positions of the input tokens are kept; position increments are
    /// recomputed from positions wherever a rule matched.
    pub fn apply(&self, tokens: Vec<Token>, mode: OutputMode) -> Vec<Token> {
        if self.is_empty() || tokens.is_empty() {
            return tokens;
        }

        let mut output = Vec::with_capacity(tokens.len());
        let mut matched_any = false;
        let mut start = 0;
        while start < tokens.len() {
            match self.longest_match(&tokens[start..]) {
                Some((length, phrases)) => {
                    emit_match(&tokens[start..start + length], phrases, mode, &mut output);
                    matched_any = true;
                    start += length;
                }
                None => {
                    output.push(tokens[start].clone());
                    start += 1;
                }
            }
        }

        if matched_any {
            for i in 1..output.len() {
                let previous = output[i - 1].position;
                output[i].position_increment = output[i].position.saturating_sub(previous);
            }
        }
        output
    }

    fn longest_match(&self, tokens: &[Token]) -> Option<(usize, &[Vec<String>])> {
        let max = self.max_input_words().min(tokens.len());
        for length in (1..=max).rev() {
            let window = &tokens[..length];
            // Stacked tokens cannot continue a phrase.
            if window[1..].iter().any(|t| t.position_increment == 0) {
                continue;
            }
            let words: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
            if let Some(phrases) = self.lookup(&words) {
                return Some((length, phrases));
            }
        }
        None
    }
}

fn emit_match(matched: &[Token], phrases: &[Vec<String>], mode: OutputMode, out: &mut Vec<Token>) {
    let first = &matched[0];
    let span = matched.len();
    let start_offset = first.start_offset;
    let end_offset = matched[span - 1].end_offset;

    let is_original = |phrase: &Vec<String>| {
        phrase
            .iter()
            .map(String::as_str)
            .eq(matched.iter().map(|t| t.text.as_str()))
    };

    // The original phrase leads when a rule keeps it.
    if phrases.iter().any(is_original) {
        out.extend(matched.iter().cloned());
    }

    // Output words never move past the matched span, so the tokens that
    // follow the match keep their own positions. Extra words stack on the
    // span's last position.
    for phrase in phrases {
        if is_original(phrase) {
            continue;
        }
        let words = phrase.len();
        for (i, word) in phrase.iter().enumerate() {
            let offset = i.min(span - 1);
            let position_length = match mode {
                OutputMode::Flat => 1,
                OutputMode::Graph if i + 1 == words => span - offset,
                OutputMode::Graph => 1,
            };
            out.push(
                Token::with_offsets(word.as_str(), first.position + offset, start_offset, end_offset)
                    .with_position_increment(first.position_increment)
                    .with_position_length(position_length)
                    .with_token_type(TokenType::Synonym),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synonym::map::SynonymMapBuilder;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn tokens(text: &str) -> Vec<Token> {
        let mut offset = 0;
        text.split_whitespace()
            .enumerate()
            .map(|(position, word)| {
                let start = text[offset..].find(word).unwrap() + offset;
                offset = start + word.len();
                Token::with_offsets(word, position, start, offset)
            })
            .collect()
    }

    fn map(rules: &[(&str, &str)]) -> SynonymMap {
        let mut builder = SynonymMapBuilder::new();
        for (input, output) in rules {
            builder.add(&words(input), &words(output)).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_expanded_group_keeps_original() {
        let map = map(&[("quick", "quick"), ("quick", "fast")]);
        let out = map.apply(tokens("a quick fox"), OutputMode::Graph);

        let texts: Vec<_> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "quick", "fast", "fox"]);
        assert_eq!(out[1].position, 1);
        assert_eq!(out[2].position, 1);
        assert_eq!(out[2].position_increment, 0);
        assert_eq!(out[2].start_offset, out[1].start_offset);
        assert!(out[2].is_synonym());
        assert!(!out[1].is_synonym());
        assert_eq!(out[3].position_increment, 1);
    }

    #[test]
    fn test_mapping_replaces_original() {
        let map = map(&[("colour", "color")]);
        let out = map.apply(tokens("red colour"), OutputMode::Graph);

        let texts: Vec<_> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["red", "color"]);
        assert_eq!(out[1].position, 1);
        assert_eq!(out[1].position_increment, 1);
    }

    #[test]
    fn test_longest_match_wins() {
        let map = map(&[("machine", "device"), ("machine learning", "ml")]);
        let out = map.apply(tokens("machine learning rocks"), OutputMode::Graph);

        let texts: Vec<_> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["ml", "rocks"]);
        assert_eq!(out[0].position_length, 2);
        assert_eq!(out[1].position, 2);
        assert_eq!(out[1].position_increment, 2);
    }

    #[test]
    fn test_flat_mode_has_unit_lengths() {
        let map = map(&[("machine learning", "ml")]);
        let out = map.apply(tokens("machine learning"), OutputMode::Flat);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].position_length, 1);
    }

    #[test]
    fn test_multi_word_output() {
        let map = map(&[("ml", "ml"), ("ml", "machine learning")]);
        let out = map.apply(tokens("ml course"), OutputMode::Graph);

        let texts: Vec<_> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["ml", "machine", "learning", "course"]);
        assert_eq!(out[1].position, 0);
        assert_eq!(out[2].position, 0);
        assert_eq!(out[2].position_increment, 0);
        assert_eq!(out[2].position_length, 1);

        // The next input token is not stacked on the synonym.
        assert_eq!(out[3].position, 1);
        assert_eq!(out[3].position_increment, 1);
    }

    #[test]
    fn test_longer_output_stays_within_span() {
        let map = map(&[("new york", "big apple city")]);
        let out = map.apply(tokens("new york pizza"), OutputMode::Graph);

        let positions: Vec<_> = out.iter().map(|t| (t.text.as_str(), t.position)).collect();
        assert_eq!(
            positions,
            vec![("big", 0), ("apple", 1), ("city", 1), ("pizza", 2)]
        );
        assert_eq!(out[2].position_length, 1);
        assert_eq!(out[3].position_increment, 1);
    }

    #[test]
    fn test_shorter_output_spans_the_match() {
        let map = map(&[("new york city", "nyc")]);
        let out = map.apply(tokens("new york city pizza"), OutputMode::Graph);

        assert_eq!(out[0].text, "nyc");
        assert_eq!(out[0].position_length, 3);
        assert_eq!(out[1].position, 3);
        assert_eq!(out[1].position_increment, 3);
    }

    #[test]
    fn test_empty_map_passes_through() {
        let input = tokens("a quick fox");
        let out = SynonymMap::empty().apply(input.clone(), OutputMode::Graph);
        assert_eq!(out, input);
    }
}
