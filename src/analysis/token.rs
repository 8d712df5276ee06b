//! Token types for text analysis.
//!
//! A [`Token`] is the unit that flows through an analyzer chain: the
//! tokenizer produces them from raw text and each token filter transforms
//! the stream. Offsets are byte offsets into the raw field value, even when
//! a char filter rewrote the text before tokenization.
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::token::Token;
//!
//! let token = Token::with_offsets("world", 1, 6, 11);
//! assert_eq!(token.text, "world");
//! assert_eq!(token.position, 1);
//! assert_eq!(token.start_offset, 6);
//! assert_eq!(token.end_offset, 11);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single analyzed unit of text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// The position of the token in its field's stream (0-based)
    pub position: usize,

    /// The byte offset where this token starts in the raw text
    pub start_offset: usize,

    /// The byte offset where this token ends in the raw text
    pub end_offset: usize,
}

impl Token {
    /// Create a new token whose offsets span `text` from the start of the input.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        let text = text.into();
        let end_offset = text.len();
        Token {
            text,
            position,
            start_offset: 0,
            end_offset,
        }
    }

    /// Create a new token with explicit offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Create a copy of this token carrying different text.
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        Token {
            text: text.into(),
            position: self.position,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
        }
    }

    /// Whether the token text still covers exactly its offsets in the raw input.
    pub fn spans_offsets(&self) -> bool {
        self.end_offset >= self.start_offset
            && self.end_offset - self.start_offset == self.text.len()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}[{}..{}]",
            self.text, self.position, self.start_offset, self.end_offset
        )
    }
}

/// A lazy stream of tokens.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Token> + 'a>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("hello", 0);
        assert_eq!(token.text, "hello");
        assert_eq!(token.position, 0);
        assert_eq!(token.start_offset, 0);
        assert_eq!(token.end_offset, 5);
        assert!(token.spans_offsets());
    }

    #[test]
    fn test_with_text_keeps_metadata() {
        let token = Token::with_offsets("Café", 3, 10, 15);
        let folded = token.with_text("cafe");
        assert_eq!(folded.position, 3);
        assert_eq!(folded.start_offset, 10);
        assert_eq!(folded.end_offset, 15);
        assert!(!folded.spans_offsets());
    }

    #[test]
    fn test_display() {
        let token = Token::with_offsets("rust", 2, 4, 8);
        assert_eq!(token.to_string(), "rust@2[4..8]");
    }
}
