//! Tokenizer implementations for text analysis.
//!
//! Tokenizers are the first token-producing step of an analyzer chain. They
//! take ownership of the (possibly char-filtered) text so the resulting
//! stream can outlive the buffer it was built from.
//!
//! # Available Tokenizers
//!
//! - [`standard::StandardTokenizer`] - Unicode word boundaries (UAX #29)
//! - [`keyword::KeywordTokenizer`] - The whole value as a single token

pub mod keyword;
pub mod standard;
