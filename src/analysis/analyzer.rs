//! Analyzers bind a filter chain to a field.
//!
//! A chain is described as data, a list of [`Stage`]s, and compiled once
//! into a [`FieldAnalyzer`]. The [`AnalyzerRegistry`] maps field names to
//! analyzers and is shared by the index writer and the query parser, so
//! documents and queries always go through identical rules.

pub mod field;
pub mod presets;
pub mod registry;
pub mod stage;

pub use field::FieldAnalyzer;
pub use registry::{AnalysisConfig, AnalyzerRegistry, AnalyzerRegistryBuilder};
pub use stage::Stage;
