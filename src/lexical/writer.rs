//! Index writer.
//!
//! The writer owns the mutable side of the index: an in-memory buffer of
//! newly added documents, the list of flushed segments with their deletion
//! sets, and the commit point they were loaded from. Exactly one writer may
//! be open on a storage at a time; this is enforced with the `write` lock.
//!
//! Changes go through three stages:
//!
//! 1. [`upsert`](IndexWriter::upsert) / [`delete`](IndexWriter::delete) edit
//!    the in-memory state and bump the version counter. A snapshot opened
//!    afterwards sees the change.
//! 2. [`flush`](IndexWriter::flush) writes buffered documents and dirty
//!    deletion sets to storage. Flushed data is not yet durable across a
//!    restart.
//! 3. [`commit`](IndexWriter::commit) writes a new commit point. Only
//!    committed generations survive a restart.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::token::Token;
use crate::document::document::Document;
use crate::error::{RepodexError, Result};
use crate::lexical::commit::{
    CommitPoint, CommittedSegment, deletions_file_name, is_index_file, segment_file_name,
};
use crate::lexical::segment::{
    AnalyzedDocument, AnalyzedField, DocId, Deletions, Segment, SegmentBuilder, SegmentView,
    deletions_from_bytes, deletions_to_bytes,
};
use crate::storage::{Storage, StorageLock, read_file, write_file_atomic};

/// Longest term, in bytes, the index accepts.
pub const MAX_TERM_LENGTH: usize = 32766;

const WRITE_LOCK: &str = "write";

// ============================================================================
// Configuration and reports
// ============================================================================

/// Index writer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexWriterConfig {
    /// Buffered documents that trigger an in-memory segment freeze.
    pub max_buffered_docs: usize,

    /// Segment count above which a triggered flush merges.
    pub max_segments: usize,

    /// Number of segments combined by one merge.
    pub merge_factor: usize,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        IndexWriterConfig {
            max_buffered_docs: 10_000,
            max_segments: 8,
            merge_factor: 4,
        }
    }
}

impl IndexWriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_buffered_docs == 0 {
            return Err(RepodexError::invalid_config(
                "writer.max_buffered_docs must be at least 1",
            ));
        }
        if self.max_segments == 0 {
            return Err(RepodexError::invalid_config(
                "writer.max_segments must be at least 1",
            ));
        }
        if self.merge_factor < 2 {
            return Err(RepodexError::invalid_config(
                "writer.merge_factor must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Statistics about the writing process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Documents added, including replacements.
    pub docs_added: u64,
    /// Documents removed by upsert or delete.
    pub docs_deleted: u64,
    /// Documents rejected during a batch.
    pub upsert_failures: u64,
    pub flushes: u64,
    pub commits: u64,
    pub merges: u64,
}

/// A document a batch upsert rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub key: String,
    pub reason: String,
}

/// Outcome of [`IndexWriter::upsert_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
}

// ============================================================================
// Analysis
// ============================================================================

/// Analyze every indexed field of `doc`.
///
/// The key field is indexed verbatim as a single term so that upserts can
/// find the previous copy regardless of how other fields are analyzed.
pub fn analyze_document(registry: &AnalyzerRegistry, doc: &Document) -> Result<AnalyzedDocument> {
    let key = doc.key();
    if key.is_empty() {
        return Err(RepodexError::upsert(
            key,
            format!("key field '{}' is missing or empty", doc.key_field()),
        ));
    }
    if key.len() > MAX_TERM_LENGTH {
        return Err(RepodexError::upsert(
            key,
            format!("key is {} bytes; the limit is {MAX_TERM_LENGTH}", key.len()),
        ));
    }

    let mut fields = Vec::new();
    for (name, value) in doc.fields() {
        if !value.indexed {
            continue;
        }
        let tokens: Vec<Token> = if name == doc.key_field() {
            vec![Token::new(key, 0)]
        } else {
            registry.analyze(name, value.as_str()).collect()
        };
        if let Some(token) = tokens.iter().find(|t| t.text.len() > MAX_TERM_LENGTH) {
            return Err(RepodexError::upsert(
                key,
                format!(
                    "field '{name}' produced a term of {} bytes; the limit is {MAX_TERM_LENGTH}",
                    token.text.len()
                ),
            ));
        }
        fields.push(AnalyzedField {
            name: name.to_string(),
            tokens,
        });
    }

    Ok(AnalyzedDocument {
        key: key.to_string(),
        stored: doc.stored_fields(),
        fields,
    })
}

// ============================================================================
// Index writer
// ============================================================================

#[derive(Debug)]
struct SegmentEntry {
    segment: Arc<Segment>,
    deletions: Arc<Deletions>,
    del_gen: u64,
    /// Whether the segment blob has been written
    durable: bool,
    /// Whether `deletions` changed since the last write
    deletions_dirty: bool,
}

impl SegmentEntry {
    fn new(segment: Segment, deletions: Deletions) -> Self {
        let deletions_dirty = !deletions.is_empty();
        SegmentEntry {
            segment: Arc::new(segment),
            deletions: Arc::new(deletions),
            del_gen: 0,
            durable: false,
            deletions_dirty,
        }
    }

    fn live_count(&self) -> usize {
        self.segment.len() - self.deletions.len()
    }

    fn committed(&self) -> CommittedSegment {
        CommittedSegment {
            id: self.segment.id(),
            del_gen: self.del_gen,
            doc_count: self.segment.len(),
            deleted_count: self.deletions.len(),
        }
    }
}

/// A merge running on a background thread.
#[derive(Debug)]
struct PendingMerge {
    id: u64,
    /// Source segment ids with the deletions they had when the merge started
    sources: Vec<(u64, Arc<Deletions>)>,
    receiver: Receiver<Segment>,
}

/// The single writer of an index.
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    registry: Arc<AnalyzerRegistry>,
    config: IndexWriterConfig,
    index_id: Uuid,

    segments: Vec<SegmentEntry>,
    buffer: SegmentBuilder,

    next_doc_id: DocId,
    next_segment_id: u64,

    /// Bumped on every visible change; shared with snapshot managers.
    version: Arc<AtomicU64>,
    generation: u64,
    last_commit: Option<CommitPoint>,

    pending_merge: Option<PendingMerge>,
    lock: Option<Box<dyn StorageLock>>,
    closed: bool,
    stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("index_id", &self.index_id)
            .field("config", &self.config)
            .field("segments", &self.segments.len())
            .field("buffered_docs", &self.buffer.len())
            .field("version", &self.version())
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open the writer on `storage`, loading the latest commit point if one
    /// exists. Fails if another writer holds the storage.
    pub fn open(
        storage: Arc<dyn Storage>,
        registry: Arc<AnalyzerRegistry>,
        config: IndexWriterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let lock = storage.acquire_lock(WRITE_LOCK)?;
        let last_commit = CommitPoint::read_latest(storage.as_ref())?;

        let mut writer = IndexWriter {
            storage,
            registry,
            config,
            index_id: Uuid::new_v4(),
            segments: Vec::new(),
            buffer: SegmentBuilder::new(),
            next_doc_id: 0,
            next_segment_id: 1,
            version: Arc::new(AtomicU64::new(0)),
            generation: 0,
            last_commit: None,
            pending_merge: None,
            lock: Some(lock),
            closed: false,
            stats: WriterStats::default(),
        };

        let loaded = match last_commit {
            Some(point) => writer.load_commit(&point).map(|()| {
                writer.version.store(point.version, Ordering::Release);
                writer.last_commit = Some(point);
            }),
            None => Ok(()),
        };
        if let Err(e) = loaded.and_then(|()| writer.delete_unreferenced_files()) {
            // Never let Drop commit over an index that failed to load.
            writer.closed = true;
            return Err(e);
        }

        info!(
            "opened index writer at generation {} ({} segments, {} live documents)",
            writer.generation,
            writer.segments.len(),
            writer.live_docs()
        );
        Ok(writer)
    }

    fn load_commit(&mut self, point: &CommitPoint) -> Result<()> {
        let storage = self.storage.as_ref();
        let mut segments = Vec::with_capacity(point.segments.len());
        for committed in &point.segments {
            let segment =
                Segment::from_bytes(&read_file(storage, &segment_file_name(committed.id))?)?;
            let deletions = if committed.del_gen > 0 {
                deletions_from_bytes(&read_file(
                    storage,
                    &deletions_file_name(committed.id, committed.del_gen),
                )?)?
            } else {
                Deletions::new()
            };
            segments.push(SegmentEntry {
                segment: Arc::new(segment),
                deletions: Arc::new(deletions),
                del_gen: committed.del_gen,
                durable: true,
                deletions_dirty: false,
            });
        }

        self.segments = segments;
        self.buffer = SegmentBuilder::new();
        self.index_id = point.index_id;
        self.next_doc_id = point.next_doc_id;
        self.next_segment_id = point.next_segment_id;
        self.generation = point.generation;
        Ok(())
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(RepodexError::other("index writer is closed"))
        } else {
            Ok(())
        }
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Add `doc`, replacing any live document with the same key.
    ///
    /// On failure the index is unchanged: analysis runs before the previous
    /// copy is removed.
    pub fn upsert(&mut self, doc: Document) -> Result<DocId> {
        self.check_closed()?;
        let analyzed = analyze_document(&self.registry, &doc)?;
        Ok(self.apply_upsert(analyzed))
    }

    /// Upsert many documents. Analysis runs in parallel; documents are
    /// applied in input order, so the last of several copies of a key wins.
    /// Documents that fail analysis are skipped and reported.
    pub fn upsert_batch(&mut self, docs: Vec<Document>) -> Result<BatchReport> {
        self.check_closed()?;
        let registry = Arc::clone(&self.registry);
        let analyzed: Vec<(String, Result<AnalyzedDocument>)> = docs
            .par_iter()
            .map(|doc| (doc.key().to_string(), analyze_document(&registry, doc)))
            .collect();

        let mut report = BatchReport::default();
        for (key, result) in analyzed {
            match result {
                Ok(doc) => {
                    self.apply_upsert(doc);
                    report.indexed += 1;
                }
                Err(e) => {
                    warn!("skipping document '{key}': {e}");
                    self.stats.upsert_failures += 1;
                    report.skipped.push(SkippedDocument {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            "batch upsert: {} indexed, {} skipped",
            report.indexed,
            report.skipped.len()
        );
        Ok(report)
    }

    fn apply_upsert(&mut self, doc: AnalyzedDocument) -> DocId {
        if self.delete_key(&doc.key) {
            self.stats.docs_deleted += 1;
        }
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.buffer.add(doc_id, doc);
        self.stats.docs_added += 1;
        self.bump_version();

        if self.buffer.len() >= self.config.max_buffered_docs {
            self.freeze_buffer();
        }
        doc_id
    }

    /// Delete the live document with `key`. Returns whether one existed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        self.check_closed()?;
        let deleted = self.delete_key(key);
        if deleted {
            self.stats.docs_deleted += 1;
            self.bump_version();
        }
        Ok(deleted)
    }

    fn delete_key(&mut self, key: &str) -> bool {
        let mut deleted = self.buffer.delete_key(key);
        for entry in &mut self.segments {
            if let Some(ord) = entry.segment.ordinal_of_key(key) {
                if !entry.deletions.contains(&ord) {
                    // Copy-on-write: snapshots keep the set they captured.
                    Arc::make_mut(&mut entry.deletions).insert(ord);
                    entry.deletions_dirty = true;
                    deleted = true;
                }
            }
        }
        deleted
    }

    fn freeze_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.buffer);
        if buffer.live_count() == 0 {
            return;
        }
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        let (segment, deletions) = buffer.freeze(id);
        debug!(
            "froze segment {id} with {} documents ({} deleted)",
            segment.len(),
            deletions.len()
        );
        self.segments.push(SegmentEntry::new(segment, deletions));
    }

    /// Capture the current in-memory state for searching. Buffered documents
    /// are frozen into a segment first so they become visible.
    pub fn open_view(&mut self) -> Vec<SegmentView> {
        self.freeze_buffer();
        self.segments
            .iter()
            .map(|entry| SegmentView {
                segment: Arc::clone(&entry.segment),
                deletions: Arc::clone(&entry.deletions),
            })
            .collect()
    }

    /// Write buffered documents and changed deletions to storage.
    ///
    /// With `wait_for_merges` a running merge is awaited (otherwise it is
    /// only applied if already finished). With `trigger_merge` a new merge
    /// starts when there are too many segments.
    pub fn flush(&mut self, wait_for_merges: bool, trigger_merge: bool) -> Result<()> {
        self.check_closed()?;
        self.flush_internal(wait_for_merges, trigger_merge)
    }

    fn flush_internal(&mut self, wait_for_merges: bool, trigger_merge: bool) -> Result<()> {
        self.collect_merge(wait_for_merges);
        self.freeze_buffer();
        self.write_pending()?;
        if trigger_merge {
            self.maybe_merge(wait_for_merges)?;
        }
        self.stats.flushes += 1;
        Ok(())
    }

    fn write_pending(&mut self) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        for entry in &mut self.segments {
            let id = entry.segment.id();
            if !entry.durable {
                write_file_atomic(
                    storage.as_ref(),
                    &segment_file_name(id),
                    &entry.segment.to_bytes()?,
                )?;
                entry.durable = true;
            }
            if entry.deletions_dirty {
                let del_gen = entry.del_gen + 1;
                write_file_atomic(
                    storage.as_ref(),
                    &deletions_file_name(id, del_gen),
                    &deletions_to_bytes(&entry.deletions)?,
                )?;
                entry.del_gen = del_gen;
                entry.deletions_dirty = false;
            }
        }
        storage.sync()
    }

    fn maybe_merge(&mut self, wait: bool) -> Result<()> {
        if self.pending_merge.is_some() || self.segments.len() <= self.config.max_segments {
            return Ok(());
        }

        let mut order: Vec<usize> = (0..self.segments.len()).collect();
        order.sort_by_key(|&i| (self.segments[i].live_count(), self.segments[i].segment.id()));
        let chosen = &order[..self.config.merge_factor.min(order.len())];

        let inputs: Vec<(Arc<Segment>, Arc<Deletions>)> = chosen
            .iter()
            .map(|&i| {
                let entry = &self.segments[i];
                (Arc::clone(&entry.segment), Arc::clone(&entry.deletions))
            })
            .collect();
        let sources: Vec<(u64, Arc<Deletions>)> = inputs
            .iter()
            .map(|(segment, deletions)| (segment.id(), Arc::clone(deletions)))
            .collect();
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        debug!("merging {} segments into segment {id}", inputs.len());

        if wait {
            let merged = Segment::merge(id, &inputs);
            self.apply_merge(id, &sources, merged);
            return self.write_pending();
        }

        let (sender, receiver) = crossbeam_channel::bounded(1);
        std::thread::Builder::new()
            .name(format!("repodex-merge-{id}"))
            .spawn(move || {
                let merged = Segment::merge(id, &inputs);
                // The writer may have been dropped or rolled back meanwhile.
                let _ = sender.send(merged);
            })?;
        self.pending_merge = Some(PendingMerge {
            id,
            sources,
            receiver,
        });
        Ok(())
    }

    fn collect_merge(&mut self, wait: bool) {
        let Some(pending) = self.pending_merge.take() else {
            return;
        };
        let received = if wait {
            pending.receiver.recv().ok()
        } else {
            match pending.receiver.try_recv() {
                Ok(segment) => Some(segment),
                Err(TryRecvError::Empty) => {
                    self.pending_merge = Some(pending);
                    return;
                }
                Err(TryRecvError::Disconnected) => None,
            }
        };
        match received {
            Some(merged) => self.apply_merge(pending.id, &pending.sources, merged),
            None => warn!("merge into segment {} was abandoned", pending.id),
        }
    }

    /// Swap merged sources for `merged`, carrying over deletions that
    /// happened while the merge ran.
    fn apply_merge(&mut self, id: u64, sources: &[(u64, Arc<Deletions>)], merged: Segment) {
        let positions: Vec<usize> = sources
            .iter()
            .filter_map(|(source_id, _)| {
                self.segments
                    .iter()
                    .position(|entry| entry.segment.id() == *source_id)
            })
            .collect();
        if positions.len() != sources.len() {
            warn!("discarding merge into segment {id}: sources changed");
            return;
        }

        let mut deletions = Deletions::new();
        for ((_, base), &pos) in sources.iter().zip(&positions) {
            let entry = &self.segments[pos];
            for ord in entry.deletions.difference(base) {
                let moved = entry
                    .segment
                    .doc(*ord)
                    .and_then(|doc| merged.ordinal_of_doc_id(doc.doc_id));
                if let Some(new_ord) = moved {
                    deletions.insert(new_ord);
                }
            }
        }

        let insert_at = positions.iter().copied().min().unwrap_or(self.segments.len());
        let mut descending = positions;
        descending.sort_unstable_by(|a, b| b.cmp(a));
        for pos in descending {
            self.segments.remove(pos);
        }
        if !merged.is_empty() {
            self.segments
                .insert(insert_at, SegmentEntry::new(merged, deletions));
        }
        self.stats.merges += 1;
        debug!("applied merge into segment {id}");
    }

    /// Make everything written so far durable as a new generation.
    ///
    /// Returns the committed generation. Committing with no changes since
    /// the last commit is a no-op that returns the current generation.
    pub fn commit(&mut self) -> Result<u64> {
        self.check_closed()?;
        self.commit_internal().map_err(|e| match e {
            RepodexError::Commit(_) => e,
            other => RepodexError::commit(other.to_string()),
        })
    }

    fn commit_internal(&mut self) -> Result<u64> {
        self.flush_internal(true, false)?;

        let segments: Vec<CommittedSegment> =
            self.segments.iter().map(SegmentEntry::committed).collect();
        let version = self.version();
        if let Some(last) = &self.last_commit {
            if last.segments == segments && last.version == version {
                debug!("nothing to commit at generation {}", self.generation);
                return Ok(self.generation);
            }
        }

        let generation = self.generation + 1;
        let point = CommitPoint {
            index_id: self.index_id,
            generation,
            version,
            next_doc_id: self.next_doc_id,
            next_segment_id: self.next_segment_id,
            segments,
            committed_at: Utc::now(),
        };
        point.write(self.storage.as_ref())?;
        self.storage.sync()?;

        let live_docs = point.live_docs();
        self.generation = generation;
        self.last_commit = Some(point);
        self.stats.commits += 1;

        if let Err(e) = self.delete_unreferenced_files() {
            warn!("failed to remove stale index files: {e}");
        }
        info!("committed generation {generation} ({live_docs} live documents)");
        Ok(generation)
    }

    /// Remove index blobs referenced neither by the last commit nor by the
    /// in-memory state.
    fn delete_unreferenced_files(&self) -> Result<()> {
        let mut referenced: HashSet<String> = self
            .last_commit
            .iter()
            .flat_map(CommitPoint::files)
            .collect();
        for entry in self.segments.iter().filter(|e| e.durable) {
            referenced.extend(entry.committed().files());
        }

        for name in self.storage.list_files()? {
            if is_index_file(&name) && !referenced.contains(&name) {
                debug!("deleting unreferenced file {name}");
                self.storage.delete_file(&name)?;
            }
        }
        Ok(())
    }

    /// Discard every change since the last commit and close the writer.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_closed()?;
        self.pending_merge = None;

        // Keep the counter monotonic so snapshots of discarded state go stale.
        let version = self.version();
        match self.last_commit.clone() {
            Some(point) => self.load_commit(&point)?,
            None => {
                self.segments.clear();
                self.buffer = SegmentBuilder::new();
            }
        }
        self.version.store(version + 1, Ordering::Release);

        let cleanup = self.delete_unreferenced_files();
        self.closed = true;
        self.release_lock()?;
        info!("rolled back to generation {}", self.generation);
        cleanup
    }

    /// Commit pending changes and release the write lock. Closing twice is a
    /// no-op. The lock is released even if the commit fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let committed = self.commit();
        self.closed = true;
        let released = self.release_lock();
        committed?;
        released?;
        info!("index writer closed at generation {}", self.generation);
        Ok(())
    }

    fn release_lock(&mut self) -> Result<()> {
        match self.lock.take() {
            Some(mut lock) => lock.release(),
            None => Ok(()),
        }
    }

    /// The change counter. Increases on every upsert or delete.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Shared handle to the change counter, readable without the writer.
    pub fn version_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.version)
    }

    /// The last committed generation; 0 before the first commit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether anything changed since the last commit.
    pub fn has_uncommitted_changes(&self) -> bool {
        match &self.last_commit {
            Some(point) => point.version != self.version(),
            None => self.version() > 0,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn buffered_docs(&self) -> usize {
        self.buffer.live_count()
    }

    /// Live documents, flushed or not.
    pub fn live_docs(&self) -> usize {
        self.segments.iter().map(SegmentEntry::live_count).sum::<usize>()
            + self.buffer.live_count()
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &IndexWriterConfig {
        &self.config
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to close index writer: {e}");
        }
    }
}
