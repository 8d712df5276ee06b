//! Token filter implementations for token transformation.
//!
//! Filters wrap a [`TokenStream`](crate::analysis::token::TokenStream) and
//! return a new lazy stream. They never reorder tokens; only the delimiter
//! splitter emits more than one token per input token.
//!
//! # Available Filters
//!
//! - [`ascii_folding::AsciiFoldingFilter`] - Folds diacritics to ASCII
//! - [`lowercase::LowercaseFilter`] - Converts tokens to lowercase
//! - [`stop::StopFilter`] - Removes stop words, leaving position gaps
//! - [`word_delimiter::WordDelimiterFilter`] - Splits on case, digit and
//!   punctuation boundaries
//!
//! # Filter Chaining
//!
//! ```text
//! Tokenizer → WordDelimiter → AsciiFolding → Lowercase → Index
//! ```

pub mod ascii_folding;
pub mod lowercase;
pub mod stop;
pub mod word_delimiter;
