//! Inverted index with near-real-time search.
//!
//! This module provides the write path ([`writer::IndexWriter`] building
//! [`segment::Segment`]s and [`commit::CommitPoint`]s), the read path
//! ([`snapshot::SnapshotManager`] handing out point-in-time snapshots) and
//! query execution ([`query::QueryParser`], [`search::Searcher`]) with BM25
//! scoring.

// Index structures
pub mod commit;
pub mod segment;
pub mod writer;

// Readers
pub mod snapshot;

// Querying
pub mod query;
pub mod scoring;
pub mod search;
