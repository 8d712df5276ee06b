//! Point-in-time snapshots of the index and their lifecycle.
//!
//! A [`Snapshot`] is an immutable list of segments, each paired with the
//! deletion set that was current when the snapshot was opened. Writers never
//! modify a segment or a captured deletion set in place, so a snapshot stays
//! consistent for as long as anyone holds it.
//!
//! The [`SnapshotManager`] keeps the current snapshot and hands out
//! [`SnapshotGuard`]s. A guard counts as one reference; dropping it (or
//! passing it to [`SnapshotManager::release`]) gives the reference back.
//! Snapshots replaced by a refresh are kept on a retired list until their
//! last reference is gone.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use ahash::AHashMap;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::error::{RepodexError, Result};
use crate::lexical::segment::SegmentView;
use crate::lexical::writer::IndexWriter;

/// Per-field length statistics over live documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Live documents with at least one token in the field
    pub doc_count: u64,
    /// Sum of token counts
    pub total_length: u64,
}

impl FieldStats {
    pub fn avg_length(&self) -> f32 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.total_length as f32 / self.doc_count as f32
        }
    }
}

/// An immutable, reference-counted view of the index.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    generation: u64,
    segments: Vec<SegmentView>,
    field_stats: AHashMap<String, FieldStats>,
    live_docs: usize,
    refs: AtomicUsize,
}

impl Snapshot {
    pub fn new(version: u64, generation: u64, segments: Vec<SegmentView>) -> Self {
        let mut field_stats: AHashMap<String, FieldStats> = AHashMap::new();
        let mut live_docs = 0;
        for view in &segments {
            for (_, doc) in view.live_docs() {
                live_docs += 1;
                for (field, &length) in &doc.field_lengths {
                    if length == 0 {
                        continue;
                    }
                    let stats = field_stats.entry(field.clone()).or_default();
                    stats.doc_count += 1;
                    stats.total_length += u64::from(length);
                }
            }
        }

        Snapshot {
            version,
            generation,
            segments,
            field_stats,
            live_docs,
            refs: AtomicUsize::new(0),
        }
    }

    /// Writer version this snapshot reflects.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Last committed generation when the snapshot was opened.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn segments(&self) -> &[SegmentView] {
        &self.segments
    }

    pub fn field_stats(&self, field: &str) -> FieldStats {
        self.field_stats.get(field).copied().unwrap_or_default()
    }

    /// Live documents containing `term` in `field`.
    pub fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments
            .iter()
            .filter_map(|view| {
                view.segment.postings(field, term).map(|postings| {
                    postings
                        .iter()
                        .filter(|p| view.is_live(p.doc))
                        .count() as u64
                })
            })
            .sum()
    }

    pub fn live_docs(&self) -> usize {
        self.live_docs
    }

    /// Outstanding guards on this snapshot.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// A counted reference to a [`Snapshot`]. The count drops when the guard
/// does.
#[derive(Debug)]
pub struct SnapshotGuard {
    snapshot: Arc<Snapshot>,
}

impl SnapshotGuard {
    fn new(snapshot: Arc<Snapshot>) -> Self {
        snapshot.refs.fetch_add(1, Ordering::AcqRel);
        SnapshotGuard { snapshot }
    }
}

impl Deref for SnapshotGuard {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        self.snapshot.refs.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Refresh state of a [`SnapshotManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// The writer has changes the current snapshot does not show, or no
    /// snapshot exists yet.
    Stale,
    /// A refresh is in progress.
    Refreshing,
    /// The current snapshot shows every change.
    Current,
}

/// Clears the refreshing flag however the refresh ends.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        RefreshingFlag(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps the current snapshot and controls refreshes.
#[derive(Debug)]
pub struct SnapshotManager {
    writer: Arc<Mutex<IndexWriter>>,
    writer_version: Arc<AtomicU64>,
    current: RwLock<Option<Arc<Snapshot>>>,
    retired: Mutex<Vec<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
    refreshing: AtomicBool,
}

impl SnapshotManager {
    /// Create a manager over `writer`. If the writer already holds a
    /// committed generation the first snapshot is opened right away;
    /// otherwise none exists until the first refresh.
    pub fn new(writer: Arc<Mutex<IndexWriter>>) -> Self {
        let (writer_version, initial) = {
            let mut guard = writer.lock();
            let initial = (guard.generation() > 0).then(|| Self::open_snapshot(&mut guard));
            (guard.version_handle(), initial)
        };
        SnapshotManager {
            writer,
            writer_version,
            current: RwLock::new(initial),
            retired: Mutex::new(Vec::new()),
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    fn open_snapshot(writer: &mut IndexWriter) -> Arc<Snapshot> {
        let version = writer.version();
        let generation = writer.generation();
        Arc::new(Snapshot::new(version, generation, writer.open_view()))
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    pub fn state(&self) -> SnapshotState {
        if self.refreshing.load(Ordering::Acquire) {
            return SnapshotState::Refreshing;
        }
        match self.current() {
            Some(snapshot) if snapshot.version == self.writer_version.load(Ordering::Acquire) => {
                SnapshotState::Current
            }
            _ => SnapshotState::Stale,
        }
    }

    /// Make every change the writer has accepted visible to new acquires.
    ///
    /// Blocks until the new snapshot is installed. Returns `false` without
    /// doing anything when the current snapshot is already up to date.
    pub fn refresh(&self) -> Result<bool> {
        let _serial = self.refresh_lock.lock();
        self.refresh_locked(true)
    }

    /// Like [`refresh`](Self::refresh), but never waits. Returns `false`
    /// immediately when another thread is already refreshing or the writer
    /// is busy; the current snapshot then stays in place.
    pub fn maybe_refresh(&self) -> Result<bool> {
        match self.refresh_lock.try_lock() {
            Some(_serial) => self.refresh_locked(false),
            None => Ok(false),
        }
    }

    fn refresh_locked(&self, wait: bool) -> Result<bool> {
        let latest = self.writer_version.load(Ordering::Acquire);
        if let Some(current) = self.current() {
            if current.version == latest {
                return Ok(false);
            }
        }

        let (snapshot, _flag) = if wait {
            let flag = RefreshingFlag::set(&self.refreshing);
            let mut writer = self.writer.lock();
            (Self::open_snapshot(&mut writer), flag)
        } else {
            let Some(mut writer) = self.writer.try_lock() else {
                debug!("writer busy, keeping snapshot");
                return Ok(false);
            };
            let flag = RefreshingFlag::set(&self.refreshing);
            (Self::open_snapshot(&mut writer), flag)
        };
        debug!(
            "refreshed snapshot to version {} ({} segments, {} live documents)",
            snapshot.version,
            snapshot.segments.len(),
            snapshot.live_docs
        );

        let previous = self.current.write().replace(snapshot);
        let mut retired = self.retired.lock();
        if let Some(previous) = previous {
            retired.push(previous);
        }
        retired.retain(|s| s.ref_count() > 0);
        Ok(true)
    }

    /// Acquire the current snapshot.
    pub fn acquire(&self) -> Result<SnapshotGuard> {
        self.current()
            .map(SnapshotGuard::new)
            .ok_or_else(|| RepodexError::snapshot_unavailable("no snapshot has been opened yet"))
    }

    /// Give back a guard obtained from [`acquire`](Self::acquire).
    pub fn release(&self, guard: SnapshotGuard) {
        drop(guard);
        self.retired.lock().retain(|s| s.ref_count() > 0);
    }

    /// Run `f` against the current snapshot. The reference is returned on
    /// every path out of `f`, including errors and panics.
    pub fn with_snapshot<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Snapshot) -> Result<T>,
    {
        let guard = self.acquire()?;
        let result = f(&guard);
        self.release(guard);
        result
    }

    /// Replaced snapshots still referenced by someone.
    pub fn retired_count(&self) -> usize {
        let mut retired = self.retired.lock();
        retired.retain(|s| s.ref_count() > 0);
        retired.len()
    }

    /// Outstanding guards over the current and retired snapshots.
    pub fn live_handles(&self) -> usize {
        let current = self.current().map_or(0, |s| s.ref_count());
        current + self.retired.lock().iter().map(|s| s.ref_count()).sum::<usize>()
    }

    /// The writer this manager reads from.
    pub fn writer(&self) -> &Arc<Mutex<IndexWriter>> {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerRegistry;
    use crate::document::document::Document;
    use crate::document::fields;
    use crate::lexical::writer::IndexWriterConfig;
    use crate::storage::memory::MemoryStorage;

    fn manager() -> SnapshotManager {
        let writer = IndexWriter::open(
            Arc::new(MemoryStorage::new()),
            Arc::new(AnalyzerRegistry::repositories().unwrap()),
            IndexWriterConfig::default(),
        )
        .unwrap();
        SnapshotManager::new(Arc::new(Mutex::new(writer)))
    }

    fn upsert(manager: &SnapshotManager, url: &str, name: &str) {
        let doc = Document::builder(fields::URL, url)
            .stored_text(fields::NAME, name)
            .build();
        manager.writer().lock().upsert(doc).unwrap();
    }

    #[test]
    fn test_unavailable_before_first_refresh() {
        let manager = manager();
        assert_eq!(manager.state(), SnapshotState::Stale);
        assert!(matches!(
            manager.acquire(),
            Err(RepodexError::SnapshotUnavailable(_))
        ));

        assert!(manager.refresh().unwrap());
        assert_eq!(manager.state(), SnapshotState::Current);
        assert_eq!(manager.acquire().unwrap().live_docs(), 0);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let manager = manager();
        upsert(&manager, "a", "Alpha");
        assert!(manager.refresh().unwrap());
        assert!(!manager.refresh().unwrap());
        assert!(!manager.maybe_refresh().unwrap());

        upsert(&manager, "b", "Beta");
        assert_eq!(manager.state(), SnapshotState::Stale);
        assert!(manager.maybe_refresh().unwrap());
        assert_eq!(manager.acquire().unwrap().live_docs(), 2);
    }

    #[test]
    fn test_maybe_refresh_skips_busy_writer() {
        let manager = manager();
        upsert(&manager, "a", "Alpha");
        assert!(manager.refresh().unwrap());

        let mut writer = manager.writer().lock();
        let doc = Document::builder(fields::URL, "b")
            .stored_text(fields::NAME, "Beta")
            .build();
        writer.upsert(doc).unwrap();
        assert!(!manager.maybe_refresh().unwrap());
        assert_eq!(manager.state(), SnapshotState::Stale);
        assert_eq!(manager.acquire().unwrap().live_docs(), 1);
        drop(writer);

        assert!(manager.maybe_refresh().unwrap());
        assert_eq!(manager.acquire().unwrap().live_docs(), 2);
    }

    #[test]
    fn test_held_snapshot_is_isolated() {
        let manager = manager();
        upsert(&manager, "a", "Alpha");
        manager.refresh().unwrap();

        let old = manager.acquire().unwrap();
        upsert(&manager, "a", "Alpha 2");
        upsert(&manager, "b", "Beta");
        manager.refresh().unwrap();

        assert_eq!(old.live_docs(), 1);
        assert_eq!(old.field_stats(fields::NAME).total_length, 1);
        assert_eq!(manager.acquire().unwrap().live_docs(), 2);
        assert_eq!(manager.retired_count(), 1);

        manager.release(old);
        assert_eq!(manager.retired_count(), 0);
        assert_eq!(manager.live_handles(), 0);
    }

    #[test]
    fn test_with_snapshot_releases_on_error() {
        let manager = manager();
        manager.refresh().unwrap();
        for _ in 0..10 {
            let result: Result<()> =
                manager.with_snapshot(|_| Err(RepodexError::other("search failed")));
            assert!(result.is_err());
        }
        assert_eq!(manager.live_handles(), 0);
    }

    #[test]
    fn test_doc_freq_ignores_deleted() {
        let manager = manager();
        upsert(&manager, "a", "rocket");
        manager.writer().lock().flush(true, false).unwrap();
        upsert(&manager, "b", "rocket");
        manager.writer().lock().delete("a").unwrap();
        manager.refresh().unwrap();

        let snapshot = manager.acquire().unwrap();
        assert_eq!(snapshot.doc_freq(fields::NAME, "rocket"), 1);
        assert_eq!(snapshot.field_stats(fields::NAME).doc_count, 1);
    }
}
