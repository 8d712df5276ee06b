//! # Repodex
//!
//! Near-real-time search over GitHub repositories.
//!
//! ## Features
//!
//! - Per-field analyzer chains shared by indexing and query parsing
//! - Segment-based index writer with upsert by key and atomic commits
//! - Reference-counted snapshots refreshed without blocking the writer
//! - BM25-ranked multi-field queries
//! - File and in-memory storage backends

pub mod analysis;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod lexical;
pub mod repository;
pub mod source;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
