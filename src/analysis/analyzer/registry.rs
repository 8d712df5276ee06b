//! Per-field analyzer registry.
//!
//! Maps field names to analyzers, falling back to a default analyzer for
//! fields without an entry. A registry is built once and never mutated, so an
//! `Arc<AnalyzerRegistry>` can be read from any number of threads without
//! locking.
//!
//! # Example
//!
//! ```
//! use repodex::analysis::analyzer::AnalyzerRegistry;
//!
//! let registry = AnalyzerRegistry::repositories().unwrap();
//!
//! let owner: Vec<_> = registry.analyze("owner", "ALICE").map(|t| t.text).collect();
//! assert_eq!(owner, vec!["alice"]);
//!
//! let body: Vec<_> = registry.analyze("readme", "<p>The Book</p>").map(|t| t.text).collect();
//! assert_eq!(body, vec!["book"]);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::field::FieldAnalyzer;
use crate::analysis::analyzer::presets;
use crate::analysis::analyzer::stage::Stage;
use crate::analysis::token::TokenStream;
use crate::document::fields;
use crate::error::Result;

/// Serializable analyzer configuration: a default chain plus per-field chains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Chain for fields without their own entry
    pub default: Vec<Stage>,
    /// Per-field chains
    pub fields: BTreeMap<String, Vec<Stage>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut field_stages = BTreeMap::new();
        field_stages.insert(fields::URL.to_string(), presets::exact());
        field_stages.insert(fields::NAME.to_string(), presets::identifier());
        field_stages.insert(fields::OWNER.to_string(), presets::exact_folded());
        AnalysisConfig {
            default: presets::standard(),
            fields: field_stages,
        }
    }
}

/// Immutable mapping from field name to analyzer.
#[derive(Clone, Debug)]
pub struct AnalyzerRegistry {
    default: Arc<FieldAnalyzer>,
    fields: AHashMap<String, Arc<FieldAnalyzer>>,
}

impl AnalyzerRegistry {
    /// Start building a registry around a default analyzer.
    pub fn builder(default: FieldAnalyzer) -> AnalyzerRegistryBuilder {
        AnalyzerRegistryBuilder {
            default: Arc::new(default),
            fields: AHashMap::new(),
        }
    }

    /// Build a registry from configuration. Any malformed chain is an
    /// [`Analysis`](crate::error::RepodexError::Analysis) error.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let default = FieldAnalyzer::new("default", config.default.clone())?;
        let mut builder = Self::builder(default);
        for (field, stages) in &config.fields {
            let analyzer = FieldAnalyzer::new(field.clone(), stages.clone())?;
            builder = builder.field(field.clone(), analyzer);
        }
        Ok(builder.build())
    }

    /// The registry for repository records:
    ///
    /// | field | chain |
    /// |---|---|
    /// | `url` | keyword |
    /// | `name` | tokenize, delimiter split, fold, lowercase |
    /// | `owner` | keyword, fold, lowercase |
    /// | anything else | strip markup, tokenize, lowercase, stop words |
    pub fn repositories() -> Result<Self> {
        Self::from_config(&AnalysisConfig::default())
    }

    /// The analyzer for `field`, or the default one.
    pub fn analyzer(&self, field: &str) -> &Arc<FieldAnalyzer> {
        self.fields.get(field).unwrap_or(&self.default)
    }

    /// The default analyzer.
    pub fn default_analyzer(&self) -> &Arc<FieldAnalyzer> {
        &self.default
    }

    /// Whether `field` has its own analyzer.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Analyze `text` with the analyzer registered for `field`.
    pub fn analyze<'a>(&'a self, field: &str, text: &'a str) -> TokenStream<'a> {
        self.analyzer(field).analyze(text)
    }
}

/// Builder for [`AnalyzerRegistry`].
#[derive(Debug)]
pub struct AnalyzerRegistryBuilder {
    default: Arc<FieldAnalyzer>,
    fields: AHashMap<String, Arc<FieldAnalyzer>>,
}

impl AnalyzerRegistryBuilder {
    /// Register an analyzer for one field.
    pub fn field<S: Into<String>>(mut self, field: S, analyzer: FieldAnalyzer) -> Self {
        self.fields.insert(field.into(), Arc::new(analyzer));
        self
    }

    /// Register the same analyzer instance for several fields.
    pub fn shared_field<S: Into<String>>(mut self, field: S, analyzer: Arc<FieldAnalyzer>) -> Self {
        self.fields.insert(field.into(), analyzer);
        self
    }

    pub fn build(self) -> AnalyzerRegistry {
        AnalyzerRegistry {
            default: self.default,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepodexError;

    fn texts(registry: &AnalyzerRegistry, field: &str, text: &str) -> Vec<String> {
        registry.analyze(field, text).map(|t| t.text).collect()
    }

    #[test]
    fn test_repository_presets() {
        let registry = AnalyzerRegistry::repositories().unwrap();

        assert_eq!(texts(&registry, "owner", "Zoë-Ann"), vec!["zoe-ann"]);
        assert_eq!(texts(&registry, "url", "https://x/A"), vec!["https://x/A"]);

        let name = texts(&registry, "name", "Foo-Bar");
        assert_eq!(name, vec!["foo", "bar"]);

        let desc = texts(&registry, "description", "A tool for the Web");
        assert_eq!(desc, vec!["tool", "web"]);
    }

    #[test]
    fn test_unmapped_field_uses_default() {
        let registry = AnalyzerRegistry::repositories().unwrap();
        assert!(!registry.has_field("topics"));
        assert_eq!(
            registry.analyzer("topics").stages(),
            registry.default_analyzer().stages()
        );
    }

    #[test]
    fn test_invalid_config_fails_at_build() {
        let mut config = AnalysisConfig::default();
        config
            .fields
            .insert("broken".to_string(), vec![Stage::Fold]);
        let err = AnalyzerRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RepodexError::Analysis(_)));
    }

    #[test]
    fn test_shared_instance() {
        let shared = Arc::new(FieldAnalyzer::new("kw", presets::exact()).unwrap());
        let registry = AnalyzerRegistry::builder(
            FieldAnalyzer::new("default", presets::standard()).unwrap(),
        )
        .shared_field("a", Arc::clone(&shared))
        .shared_field("b", Arc::clone(&shared))
        .build();
        assert!(Arc::ptr_eq(registry.analyzer("a"), registry.analyzer("b")));
    }

    #[test]
    fn test_config_json() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"default": [{"type": "tokenize"}], "fields": {"tag": [{"type": "keyword"}]}}"#,
        )
        .unwrap();
        let registry = AnalyzerRegistry::from_config(&config).unwrap();
        assert_eq!(texts(&registry, "tag", "A B"), vec!["A B"]);
        assert_eq!(texts(&registry, "other", "A B"), vec!["A", "B"]);
    }
}
