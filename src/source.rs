//! Upstream sources of repository records.
//!
//! A [`RecordSource`] fetches every repository of an organization. Optional
//! parts of a record that the upstream does not have (no description, no
//! README) are `None`; turning a record into a [`Document`] maps them to
//! empty strings.

use serde::{Deserialize, Serialize};

use crate::document::document::Document;
use crate::document::fields;
use crate::error::Result;

pub mod github;
pub mod jsonl;

pub use github::GitHubSource;
pub use jsonl::JsonlSource;

/// One repository as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    /// Web URL; the unique key in the index
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub readme_html: Option<String>,
}

impl Record {
    /// Build the indexed document: `url` (key), `name`, `description` and
    /// `owner` stored; `readme` indexed only.
    pub fn into_document(self) -> Document {
        Document::builder(fields::URL, self.url)
            .stored_text(fields::NAME, self.name)
            .stored_text(fields::DESCRIPTION, self.description.unwrap_or_default())
            .stored_text(fields::OWNER, self.owner_name.unwrap_or_default())
            .unstored_text(fields::README, self.readme_html.unwrap_or_default())
            .build()
    }
}

/// Something that can list the repositories of an organization.
pub trait RecordSource: Send + Sync + std::fmt::Debug {
    fn fetch_records(&self, organization: &str) -> Result<Vec<Record>>;
}
