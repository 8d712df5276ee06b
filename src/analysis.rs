//! Text analysis for Repodex.
//!
//! Raw field text goes through char filters, a tokenizer and token filters
//! to become a stream of normalized [`Token`](token::Token)s. Chains are
//! declared as data ([`analyzer::Stage`]) and looked up per field through the
//! [`analyzer::AnalyzerRegistry`].

pub mod analyzer;
pub mod char_filter;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
