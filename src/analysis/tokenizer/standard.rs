//! Word-boundary tokenizer.
//!
//! Splits text on Unicode word boundaries (UAX #29) and keeps the segments
//! that contain at least one alphanumeric character, so punctuation and
//! whitespace never become tokens.
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::tokenizer::standard::StandardTokenizer;
//!
//! let tokens: Vec<_> = StandardTokenizer::new().tokenize("Hello, world!".into()).collect();
//! assert_eq!(tokens[0].text, "Hello");
//! assert_eq!(tokens[1].text, "world");
//! assert_eq!(tokens[1].position, 1);
//! ```

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};

/// Default upper bound on a token's byte length.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 255;

/// A tokenizer that splits text on Unicode word boundaries.
///
/// Words longer than `max_token_length` bytes are skipped. They still use up
/// a position, so phrase distances across them are preserved.
#[derive(Clone, Debug)]
pub struct StandardTokenizer {
    max_token_length: usize,
}

impl StandardTokenizer {
    /// Create a tokenizer with the default maximum token length.
    pub fn new() -> Self {
        Self::with_max_token_length(DEFAULT_MAX_TOKEN_LENGTH)
    }

    /// Create a tokenizer with a custom maximum token length.
    pub fn with_max_token_length(max_token_length: usize) -> Self {
        StandardTokenizer { max_token_length }
    }

    /// The maximum byte length of an emitted token.
    pub fn max_token_length(&self) -> usize {
        self.max_token_length
    }

    /// Tokenize the given text into a lazy stream of tokens.
    pub fn tokenize<'a>(&self, text: Cow<'a, str>) -> TokenStream<'a> {
        Box::new(StandardTokens {
            text,
            cursor: 0,
            position: 0,
            max_token_length: self.max_token_length,
        })
    }
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator state for [`StandardTokenizer`].
///
/// Owns the text and resumes segmentation from the last word boundary.
struct StandardTokens<'a> {
    text: Cow<'a, str>,
    cursor: usize,
    position: usize,
    max_token_length: usize,
}

impl Iterator for StandardTokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while self.cursor < self.text.len() {
            let start = self.cursor;
            let segment = self.text[start..].split_word_bounds().next()?;
            self.cursor += segment.len();

            if !segment.chars().any(char::is_alphanumeric) {
                continue;
            }

            let position = self.position;
            self.position += 1;
            if segment.len() > self.max_token_length {
                continue;
            }

            return Some(Token::with_offsets(
                segment,
                position,
                start,
                start + segment.len(),
            ));
        }
        None
    }
}
