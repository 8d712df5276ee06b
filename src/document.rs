//! Documents handed to the index writer.
//!
//! A [`Document`](document::Document) maps field names to
//! [`FieldValue`](field_value::FieldValue)s. One distinguished field holds
//! the unique key used for upserts; it is always stored and indexed as a
//! single exact term.
//!
//! # Examples
//!
//! ```
//! use repodex::document::document::Document;
//!
//! let doc = Document::builder("url", "https://github.com/acme/rocket")
//!     .stored_text("name", "rocket")
//!     .unstored_text("readme", "<h1>Rocket</h1>")
//!     .build();
//!
//! assert_eq!(doc.key(), "https://github.com/acme/rocket");
//! assert!(doc.get("readme").is_some_and(|f| !f.stored));
//! ```

#[allow(clippy::module_inception)]
pub mod document;
pub mod field_value;

/// Field names of an indexed repository record.
pub mod fields {
    /// Unique key: the repository's web URL
    pub const URL: &str = "url";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const OWNER: &str = "owner";
    /// README rendered as HTML; indexed but not stored
    pub const README: &str = "readme";

    /// Fields an unqualified query searches.
    pub const DEFAULT_SEARCH: &[&str] = &[NAME, DESCRIPTION, README];
}
