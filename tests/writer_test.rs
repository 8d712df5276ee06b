use std::sync::Arc;

use repodex::analysis::analyzer::AnalyzerRegistry;
use repodex::document::document::Document;
use repodex::document::fields;
use repodex::error::{RepodexError, Result};
use repodex::lexical::writer::{IndexWriter, IndexWriterConfig};
use repodex::storage::memory::MemoryStorage;

fn repo(url: &str, name: &str) -> Document {
    Document::builder(fields::URL, url)
        .stored_text(fields::NAME, name)
        .stored_text(fields::OWNER, "acme")
        .build()
}

fn open(storage: &MemoryStorage, config: IndexWriterConfig) -> Result<IndexWriter> {
    IndexWriter::open(
        Arc::new(storage.clone()),
        Arc::new(AnalyzerRegistry::repositories()?),
        config,
    )
}

#[test]
fn test_buffer_flushes_at_threshold() -> Result<()> {
    let storage = MemoryStorage::new();
    let config = IndexWriterConfig {
        max_buffered_docs: 3,
        ..IndexWriterConfig::default()
    };
    let mut writer = open(&storage, config)?;

    for i in 0..7 {
        writer.upsert(repo(&format!("u{i}"), &format!("repo{i}")))?;
    }
    assert_eq!(writer.live_docs(), 7);
    assert_eq!(writer.segment_count(), 2);
    assert_eq!(writer.buffered_docs(), 1);

    writer.close()?;
    let writer = open(&storage, IndexWriterConfig::default())?;
    assert_eq!(writer.live_docs(), 7);
    Ok(())
}

#[test]
fn test_version_counts_changes_and_commit_does_not() -> Result<()> {
    let storage = MemoryStorage::new();
    let mut writer = open(&storage, IndexWriterConfig::default())?;
    assert_eq!(writer.version(), 0);
    assert!(!writer.has_uncommitted_changes());

    writer.upsert(repo("u1", "one"))?;
    writer.upsert(repo("u1", "one again"))?;
    let version = writer.version();
    assert!(version >= 2);
    assert!(writer.has_uncommitted_changes());

    assert_eq!(writer.commit()?, 1);
    assert_eq!(writer.version(), version);
    assert!(!writer.has_uncommitted_changes());

    // Nothing changed: same generation.
    assert_eq!(writer.commit()?, 1);

    assert!(writer.delete("u1")?);
    assert!(!writer.delete("missing")?);
    assert_eq!(writer.commit()?, 2);
    assert_eq!(writer.live_docs(), 0);
    writer.close()
}

#[test]
fn test_rollback_discards_uncommitted() -> Result<()> {
    let storage = MemoryStorage::new();
    let mut writer = open(&storage, IndexWriterConfig::default())?;
    writer.upsert(repo("u1", "kept"))?;
    writer.commit()?;

    writer.upsert(repo("u2", "discarded"))?;
    writer.upsert(repo("u1", "overwritten"))?;
    writer.rollback()?;
    assert!(writer.is_closed());
    assert!(writer.upsert(repo("u3", "late")).is_err());

    let mut writer = open(&storage, IndexWriterConfig::default())?;
    assert_eq!(writer.live_docs(), 1);
    let names: Vec<String> = writer
        .open_view()
        .iter()
        .flat_map(|view| {
            view.live_docs()
                .map(|(_, doc)| doc.stored[fields::NAME].clone())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(names, vec!["kept"]);
    writer.close()
}

#[test]
fn test_batch_skips_bad_documents() -> Result<()> {
    let storage = MemoryStorage::new();
    let mut writer = open(&storage, IndexWriterConfig::default())?;

    let report = writer.upsert_batch(vec![
        repo("u1", "good"),
        repo("", "no key"),
        repo("u2", "also good"),
    ])?;
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(writer.stats().upsert_failures, 1);
    assert_eq!(writer.live_docs(), 2);
    writer.close()
}

#[test]
fn test_invalid_config_is_rejected() {
    let storage = MemoryStorage::new();
    let config = IndexWriterConfig {
        merge_factor: 1,
        ..IndexWriterConfig::default()
    };
    assert!(matches!(
        open(&storage, config),
        Err(RepodexError::InvalidConfig(_))
    ));

    // The failed open does not hold the lock.
    assert!(open(&storage, IndexWriterConfig::default()).is_ok());
}
