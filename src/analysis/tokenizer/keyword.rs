//! Keyword tokenizer: the entire value is one token.

use std::borrow::Cow;

use crate::analysis::token::{Token, TokenStream};

/// Emits the whole input as a single token at position 0.
///
/// Empty input produces no tokens.
#[derive(Clone, Debug, Default)]
pub struct KeywordTokenizer;

impl KeywordTokenizer {
    pub fn new() -> Self {
        KeywordTokenizer
    }

    pub fn tokenize<'a>(&self, text: Cow<'a, str>) -> TokenStream<'a> {
        if text.is_empty() {
            return Box::new(std::iter::empty());
        }
        let len = text.len();
        Box::new(std::iter::once(Token::with_offsets(
            text.into_owned(),
            0,
            0,
            len,
        )))
    }
}
