//! Commit points and index file naming.
//!
//! A commit point `segments_<generation>` is a small JSON document listing
//! the segments (and the deletion generation of each) that make up one
//! durable state of the index. The highest generation present in the store
//! is the current one. Segment and deletion blobs not referenced by it are
//! garbage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RepodexError, Result};
use crate::storage::{Storage, read_file, write_file_atomic};

const COMMIT_PREFIX: &str = "segments_";
const SEGMENT_PREFIX: &str = "seg_";
const DELETIONS_PREFIX: &str = "del_";

/// Blob name of segment `id`.
pub fn segment_file_name(id: u64) -> String {
    format!("{SEGMENT_PREFIX}{id}.bin")
}

/// Blob name of generation `del_gen` of segment `id`'s deletions.
pub fn deletions_file_name(id: u64, del_gen: u64) -> String {
    format!("{DELETIONS_PREFIX}{id}_{del_gen}.bin")
}

/// Blob name of commit point `generation`.
pub fn commit_file_name(generation: u64) -> String {
    format!("{COMMIT_PREFIX}{generation}")
}

/// Whether `name` is a blob owned by the index (as opposed to locks or
/// foreign files).
pub fn is_index_file(name: &str) -> bool {
    name.starts_with(COMMIT_PREFIX)
        || name.starts_with(SEGMENT_PREFIX)
        || name.starts_with(DELETIONS_PREFIX)
}

/// One segment as recorded in a commit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedSegment {
    pub id: u64,
    /// Deletion generation; 0 means no deletions file
    pub del_gen: u64,
    pub doc_count: usize,
    pub deleted_count: usize,
}

impl CommittedSegment {
    pub fn files(&self) -> Vec<String> {
        let mut files = vec![segment_file_name(self.id)];
        if self.del_gen > 0 {
            files.push(deletions_file_name(self.id, self.del_gen));
        }
        files
    }
}

/// A durable generation of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPoint {
    pub index_id: Uuid,
    pub generation: u64,
    /// Writer change counter at commit time
    pub version: u64,
    pub next_doc_id: u64,
    pub next_segment_id: u64,
    pub segments: Vec<CommittedSegment>,
    pub committed_at: DateTime<Utc>,
}

impl CommitPoint {
    /// Every blob this commit point references, including itself.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.segments.iter().flat_map(|s| s.files()).collect();
        files.push(commit_file_name(self.generation));
        files
    }

    pub fn live_docs(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.doc_count - s.deleted_count)
            .sum()
    }

    /// Write this commit point atomically.
    pub fn write(&self, storage: &dyn Storage) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_file_atomic(storage, &commit_file_name(self.generation), &json)
    }

    /// Read commit point `generation`.
    pub fn read(storage: &dyn Storage, generation: u64) -> Result<Self> {
        let data = read_file(storage, &commit_file_name(generation))?;
        let point: CommitPoint = serde_json::from_slice(&data)?;
        if point.generation != generation {
            return Err(RepodexError::storage(format!(
                "commit point {} records generation {}",
                commit_file_name(generation),
                point.generation
            )));
        }
        Ok(point)
    }

    /// The highest generation present in `storage`, if any.
    pub fn latest_generation(storage: &dyn Storage) -> Result<Option<u64>> {
        Ok(storage
            .list_files()?
            .iter()
            .filter_map(|name| name.strip_prefix(COMMIT_PREFIX))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max())
    }

    /// Read the latest commit point, if one exists.
    pub fn read_latest(storage: &dyn Storage) -> Result<Option<Self>> {
        match Self::latest_generation(storage)? {
            Some(generation) => Self::read(storage, generation).map(Some),
            None => Ok(None),
        }
    }
}
