//! Field values.

use serde::{Deserialize, Serialize};

/// A raw field value together with how the index should treat it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// The raw text
    pub value: String,
    /// Returned with search hits
    pub stored: bool,
    /// Analyzed into postings
    pub indexed: bool,
}

impl FieldValue {
    /// A value that is both searchable and returned with hits.
    pub fn stored<S: Into<String>>(value: S) -> Self {
        FieldValue {
            value: value.into(),
            stored: true,
            indexed: true,
        }
    }

    /// A searchable value that is not kept in the index.
    pub fn unstored<S: Into<String>>(value: S) -> Self {
        FieldValue {
            value: value.into(),
            stored: false,
            indexed: true,
        }
    }

    /// A value that is only returned with hits and never searched.
    pub fn stored_only<S: Into<String>>(value: S) -> Self {
        FieldValue {
            value: value.into(),
            stored: true,
            indexed: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}
