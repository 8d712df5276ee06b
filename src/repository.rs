//! Repository search index.
//!
//! [`RepositoryIndex`] wires the pieces together: one analyzer registry
//! shared by the writer and the query parser, the writer behind a mutex, and
//! a snapshot manager for readers. It is `Sync`; searches from many threads
//! run concurrently and never wait for an indexing run. While the writer is
//! busy they read the last installed snapshot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use repodex::config::RepodexConfig;
//! use repodex::repository::RepositoryIndex;
//! use repodex::source::Record;
//! use repodex::storage::memory::MemoryStorage;
//!
//! # fn main() -> repodex::error::Result<()> {
//! let index = RepositoryIndex::open(Arc::new(MemoryStorage::new()), RepodexConfig::default())?;
//! index.index_records(vec![Record {
//!     id: 1,
//!     url: "https://github.com/acme/rocket".to_string(),
//!     name: "rocket".to_string(),
//!     description: Some("Launches things".to_string()),
//!     owner_name: Some("acme".to_string()),
//!     readme_html: None,
//! }])?;
//!
//! let outcome = index.search("launches", 10)?;
//! assert_eq!(outcome.total_hits, 1);
//! assert_eq!(outcome.results[0].name, "rocket");
//! index.close()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use log::info;
use parking_lot::Mutex;
use serde::Serialize;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::config::RepodexConfig;
use crate::document::fields;
use crate::error::Result;
use crate::lexical::query::QueryParser;
use crate::lexical::search::{Hit, Searcher};
use crate::lexical::snapshot::SnapshotManager;
use crate::lexical::writer::{IndexWriter, SkippedDocument};
use crate::source::{Record, RecordSource};
use crate::storage::Storage;

/// One search hit as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub description: String,
    pub url: String,
    pub score: f32,
}

impl SearchResult {
    fn from_hit(hit: Hit) -> Self {
        let name = hit.field(fields::NAME).unwrap_or_default().to_string();
        let description = hit.field(fields::DESCRIPTION).unwrap_or_default().to_string();
        SearchResult {
            name,
            description,
            url: hit.key,
            score: hit.score,
        }
    }
}

/// Results of [`RepositoryIndex::search`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// All matches, possibly more than `results.len()`
    pub total_hits: usize,
}

/// Results of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    /// Generation committed by the run
    pub generation: u64,
}

/// Searchable index of repository records.
#[derive(Debug)]
pub struct RepositoryIndex {
    config: RepodexConfig,
    registry: Arc<AnalyzerRegistry>,
    writer: Arc<Mutex<IndexWriter>>,
    snapshots: SnapshotManager,
    parser: QueryParser,
}

impl RepositoryIndex {
    /// Open the index on `storage`. Fails if the configuration is invalid,
    /// an analyzer chain is malformed, or another writer holds the storage.
    pub fn open(storage: Arc<dyn Storage>, config: RepodexConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(AnalyzerRegistry::from_config(&config.analysis)?);
        let writer = IndexWriter::open(storage, Arc::clone(&registry), config.writer.clone())?;
        let writer = Arc::new(Mutex::new(writer));
        let snapshots = SnapshotManager::new(Arc::clone(&writer));
        snapshots.refresh()?;
        let parser = QueryParser::new(
            Arc::clone(&registry),
            config.search_fields.clone(),
            fields::URL,
        );

        Ok(RepositoryIndex {
            config,
            registry,
            writer,
            snapshots,
            parser,
        })
    }

    /// Upsert `records`, flush and commit.
    ///
    /// Records that fail to index are skipped and listed in the report. A
    /// failed commit ends the run with an error.
    pub fn index_records(&self, records: Vec<Record>) -> Result<IndexingReport> {
        let docs = records.into_iter().map(Record::into_document).collect();

        let mut writer = self.writer.lock();
        let batch = writer.upsert_batch(docs)?;
        writer.flush(true, true)?;
        let generation = writer.commit()?;

        info!(
            "indexed {} records, skipped {} (generation {generation})",
            batch.indexed,
            batch.skipped.len()
        );
        Ok(IndexingReport {
            indexed: batch.indexed,
            skipped: batch.skipped,
            generation,
        })
    }

    /// Fetch every repository of `organization` from `source` and index it.
    pub fn index_organization(
        &self,
        source: &dyn RecordSource,
        organization: &str,
    ) -> Result<IndexingReport> {
        let records = source.fetch_records(organization)?;
        info!("indexing {} records of '{organization}'", records.len());
        self.index_records(records)
    }

    /// Search for `query`, returning at most `limit` results.
    ///
    /// Picks up finished indexing runs first. If the writer is in the middle
    /// of a run, the search reads the last snapshot instead of waiting.
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchOutcome> {
        let query = self.parser.parse(query)?;
        self.snapshots.maybe_refresh()?;

        self.snapshots.with_snapshot(|snapshot| {
            let found = Searcher::new(snapshot)
                .with_scoring(self.config.scoring)
                .search(&query, limit);
            Ok(SearchOutcome {
                results: found.hits.into_iter().map(SearchResult::from_hit).collect(),
                total_hits: found.total_hits,
            })
        })
    }

    /// Commit pending changes and release the storage. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        self.writer.lock().close()
    }

    pub fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    pub fn config(&self) -> &RepodexConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn writer(&self) -> &Arc<Mutex<IndexWriter>> {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepodexError;
    use crate::storage::memory::MemoryStorage;
    use std::thread;
    use std::time::Duration;

    fn record(url: &str, name: &str, owner: &str) -> Record {
        Record {
            id: 0,
            url: url.to_string(),
            name: name.to_string(),
            description: None,
            owner_name: Some(owner.to_string()),
            readme_html: None,
        }
    }

    fn index() -> RepositoryIndex {
        RepositoryIndex::open(Arc::new(MemoryStorage::new()), RepodexConfig::default()).unwrap()
    }

    #[test]
    fn test_index_and_search() {
        let index = index();
        let report = index
            .index_records(vec![record("a", "Foo-Bar", "Alice"), record("b", "Baz", "Bob")])
            .unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(report.generation, 1);

        let outcome = index.search("foo", 10).unwrap();
        assert_eq!(outcome.total_hits, 1);
        assert_eq!(outcome.results[0].url, "a");
        assert_eq!(outcome.results[0].name, "Foo-Bar");
        assert!(outcome.results[0].score > 0.0);
    }

    #[test]
    fn test_search_before_indexing() {
        let index = index();
        let outcome = index.search("anything", 10).unwrap();
        assert_eq!(outcome, SearchOutcome::default());
        assert!(matches!(
            index.search("", 10),
            Err(RepodexError::QueryParse(_))
        ));
    }

    #[test]
    fn test_skipped_records_are_reported() {
        let index = index();
        let report = index
            .index_records(vec![record("", "nameless", "x"), record("a", "ok", "x")])
            .unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "");
    }

    #[test]
    fn test_search_reads_last_snapshot_while_writer_busy() {
        let index = index();
        index.index_records(vec![record("a", "rocket", "x")]).unwrap();
        assert_eq!(index.search("rocket", 10).unwrap().total_hits, 1);

        let mut writer = index.writer().lock();
        writer
            .upsert(record("b", "rocket", "y").into_document())
            .unwrap();

        let (sender, receiver) = crossbeam_channel::bounded(1);
        thread::scope(|scope| {
            let shared = &index;
            scope.spawn(move || {
                let _ = sender.send(shared.search("rocket", 10).map(|o| o.total_hits));
            });
            let hits = receiver.recv_timeout(Duration::from_secs(5));
            drop(writer);
            assert_eq!(hits.unwrap().unwrap(), 1);
        });

        assert_eq!(index.search("rocket", 10).unwrap().total_hits, 2);
    }
}
