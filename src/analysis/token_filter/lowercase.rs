//! Lowercase filter implementation.
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::token::Token;
//! use repodex::analysis::token_filter::lowercase::LowercaseFilter;
//!
//! let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1)];
//! let filtered: Vec<_> = LowercaseFilter::new()
//!     .filter(Box::new(tokens.into_iter()))
//!     .collect();
//!
//! assert_eq!(filtered[0].text, "hello");
//! assert_eq!(filtered[1].text, "world");
//! ```

use crate::analysis::token::TokenStream;

/// A filter that converts tokens to lowercase.
///
/// Uses Unicode lowercasing, which does not depend on the process locale.
/// Positions and offsets are preserved.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    /// Create a new lowercase filter.
    pub fn new() -> Self {
        LowercaseFilter
    }

    pub fn filter<'a>(&self, tokens: TokenStream<'a>) -> TokenStream<'a> {
        Box::new(tokens.map(|mut token| {
            if token.text.is_ascii() {
                token.text.make_ascii_lowercase();
            } else if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
            token
        }))
    }
}
