//! Per-stream synonym consumer.

use crate::analysis::token::{Token, TokenStream};
use crate::reload::live::ConsumerHandle;

use super::graph::OutputMode;

/// A token stream being rewritten with synonyms.
///
/// The stream is registered as a consumer for as long as it lives. It reads
/// its table once, when the first token is pulled, and uses that table for
/// the whole pass; a reload broadcast before that point is picked up.
pub struct SynonymStream {
    input: Option<TokenStream>,
    output: std::vec::IntoIter<Token>,
    consumer: ConsumerHandle,
    mode: OutputMode,
}

impl SynonymStream {
    /// Wrap `input`, rewriting it with the table of `consumer`.
    pub fn new(input: TokenStream, consumer: ConsumerHandle, mode: OutputMode) -> Self {
        SynonymStream {
            input: Some(input),
            output: Vec::new().into_iter(),
            consumer,
            mode,
        }
    }

    /// The registration backing this stream.
    pub fn consumer(&self) -> &ConsumerHandle {
        &self.consumer
    }
}

impl Iterator for SynonymStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(input) = self.input.take() {
            let table = self.consumer.table();
            let tokens: Vec<Token> = input.collect();
            self.output = table.apply(tokens, self.mode).into_iter();
        }
        self.output.next()
    }
}

impl std::fmt::Debug for SynonymStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynonymStream")
            .field("consumer", &self.consumer.id())
            .field("started", &self.input.is_none())
            .field("mode", &self.mode)
            .finish()
    }
}
