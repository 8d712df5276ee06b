//! Configuration.
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! {
//!   "default_limit": 20,
//!   "writer": { "max_buffered_docs": 500 },
//!   "analysis": {
//!     "fields": {
//!       "name": [{ "type": "tokenize" }, { "type": "lowercase" }],
//!       "owner": [{ "type": "keyword" }, { "type": "lowercase" }]
//!     }
//!   }
//! }
//! ```
//!
//! `analysis.fields` replaces the whole per-field table, so it must list
//! every field that needs its own chain. Changing analysis on an existing
//! index requires reindexing.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::AnalysisConfig;
use crate::document::fields;
use crate::error::{RepodexError, Result};
use crate::lexical::scoring::Bm25;
use crate::lexical::writer::IndexWriterConfig;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepodexConfig {
    /// Fields searched by unqualified query terms.
    pub search_fields: Vec<String>,

    /// Hits returned when the caller gives no limit.
    pub default_limit: usize,

    pub scoring: Bm25,

    pub writer: IndexWriterConfig,

    pub analysis: AnalysisConfig,
}

impl Default for RepodexConfig {
    fn default() -> Self {
        RepodexConfig {
            search_fields: fields::DEFAULT_SEARCH.iter().map(|f| f.to_string()).collect(),
            default_limit: 10,
            scoring: Bm25::default(),
            writer: IndexWriterConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl RepodexConfig {
    /// Load a JSON config file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RepodexError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: RepodexConfig = serde_json::from_str(&text).map_err(|e| {
            RepodexError::invalid_config(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot. Analyzer chains are checked when the
    /// registry is built.
    pub fn validate(&self) -> Result<()> {
        if self.search_fields.is_empty() {
            return Err(RepodexError::invalid_config("search_fields must not be empty"));
        }
        if self.search_fields.iter().any(|f| f.is_empty()) {
            return Err(RepodexError::invalid_config("search_fields contains an empty name"));
        }
        if self.default_limit == 0 {
            return Err(RepodexError::invalid_config("default_limit must be at least 1"));
        }
        if self.scoring.k1.is_nan() || self.scoring.k1 < 0.0 {
            return Err(RepodexError::invalid_config("scoring.k1 must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.scoring.b) {
            return Err(RepodexError::invalid_config("scoring.b must be within [0, 1]"));
        }
        self.writer.validate()
    }
}
