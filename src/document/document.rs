//! Document structure and builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;

/// A document: field name → value, with one field acting as the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    key_field: String,
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Start a document whose unique key is `key_field = key`.
    pub fn builder<F: Into<String>, K: Into<String>>(key_field: F, key: K) -> DocumentBuilder {
        let key_field = key_field.into();
        let mut fields = BTreeMap::new();
        fields.insert(key_field.clone(), FieldValue::stored(key));
        DocumentBuilder {
            doc: Document { key_field, fields },
        }
    }

    /// Name of the key field.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Value of the key field (empty if it was removed or never set).
    pub fn key(&self) -> &str {
        self.fields
            .get(&self.key_field)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Text of a field, if present.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|f| f.value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields that are returned with search hits.
    pub fn stored_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(_, v)| v.stored)
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`Document`].
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Document,
}

impl DocumentBuilder {
    /// Add a field with explicit flags. Setting the key field again replaces
    /// the key but keeps it stored and indexed.
    pub fn field<S: Into<String>>(mut self, name: S, value: FieldValue) -> Self {
        let name = name.into();
        let value = if name == self.doc.key_field {
            FieldValue::stored(value.value)
        } else {
            value
        };
        self.doc.fields.insert(name, value);
        self
    }

    /// Add a searchable field that is returned with hits.
    pub fn stored_text<S: Into<String>, V: Into<String>>(self, name: S, value: V) -> Self {
        self.field(name, FieldValue::stored(value))
    }

    /// Add a searchable field that is not stored.
    pub fn unstored_text<S: Into<String>, V: Into<String>>(self, name: S, value: V) -> Self {
        self.field(name, FieldValue::unstored(value))
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_always_stored_and_indexed() {
        let doc = Document::builder("url", "a")
            .field("url", FieldValue::stored_only("b"))
            .build();
        let key = doc.get("url").unwrap();
        assert_eq!(doc.key(), "b");
        assert!(key.stored && key.indexed);
    }

    #[test]
    fn test_stored_fields() {
        let doc = Document::builder("url", "a")
            .stored_text("name", "n")
            .unstored_text("readme", "r")
            .build();
        let stored = doc.stored_fields();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.get("name").map(String::as_str), Some("n"));
        assert!(!stored.contains_key("readme"));
        assert_eq!(doc.len(), 3);
    }
}
