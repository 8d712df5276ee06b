use std::sync::Arc;

use repodex::config::RepodexConfig;
use repodex::error::{RepodexError, Result};
use repodex::repository::RepositoryIndex;
use repodex::source::Record;
use repodex::storage::memory::MemoryStorage;

fn record(url: &str, name: &str, description: &str, owner: &str) -> Record {
    Record {
        id: 0,
        url: url.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        owner_name: Some(owner.to_string()),
        readme_html: None,
    }
}

fn open() -> Result<RepositoryIndex> {
    RepositoryIndex::open(Arc::new(MemoryStorage::new()), RepodexConfig::default())
}

fn urls(index: &RepositoryIndex, query: &str) -> Result<Vec<String>> {
    Ok(index
        .search(query, 10)?
        .results
        .into_iter()
        .map(|r| r.url)
        .collect())
}

#[test]
fn test_name_parts_and_owner_lookup() -> Result<()> {
    let index = open()?;
    index.index_records(vec![
        record("https://github.com/alice/foo-bar", "Foo-Bar", "", "Alice"),
        record("https://github.com/bob/baz", "baz", "Baz of bob", "Bob"),
    ])?;

    assert_eq!(urls(&index, "foo")?, vec!["https://github.com/alice/foo-bar"]);
    assert_eq!(urls(&index, "BAR")?, vec!["https://github.com/alice/foo-bar"]);
    assert_eq!(urls(&index, "Foo-Bar")?, vec!["https://github.com/alice/foo-bar"]);

    // Owner matches the whole value, ignoring case.
    assert_eq!(urls(&index, "owner:ALICE")?, vec!["https://github.com/alice/foo-bar"]);
    assert_eq!(urls(&index, "owner:alice")?, vec!["https://github.com/alice/foo-bar"]);
    assert!(urls(&index, "owner:ali")?.is_empty());

    // The key is matched verbatim.
    assert_eq!(
        urls(&index, "url:\"https://github.com/bob/baz\"")?,
        vec!["https://github.com/bob/baz"]
    );

    index.close()
}

#[test]
fn test_rejected_queries() -> Result<()> {
    let index = open()?;
    index.index_records(vec![record("u1", "thing", "", "x")])?;

    for query in ["", "   ", "\"unterminated", "name:", "\"\"", "\"   \""] {
        assert!(
            matches!(index.search(query, 10), Err(RepodexError::QueryParse(_))),
            "{query:?} should not parse"
        );
    }

    // Stop words only: parses, matches nothing.
    let outcome = index.search("description:the", 10)?;
    assert_eq!(outcome.total_hits, 0);
    assert!(outcome.results.is_empty());

    index.close()
}

#[test]
fn test_term_frequency_ranks_higher() -> Result<()> {
    let index = open()?;
    index.index_records(vec![
        record("once", "a", "rust tools fast", "x"),
        record("twice", "b", "rust rust tools", "x"),
        record("none", "c", "python tools only", "x"),
    ])?;

    let outcome = index.search("rust", 10)?;
    assert_eq!(outcome.total_hits, 2);
    assert_eq!(outcome.results[0].url, "twice");
    assert_eq!(outcome.results[1].url, "once");
    assert!(outcome.results[0].score > outcome.results[1].score);

    index.close()
}

#[test]
fn test_limit_caps_results_but_not_total() -> Result<()> {
    let index = open()?;
    let records = (0..5)
        .map(|i| record(&format!("u{i}"), &format!("repo{i}"), "shared words", "x"))
        .collect();
    index.index_records(records)?;

    let outcome = index.search("shared", 2)?;
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.total_hits, 5);

    let outcome = index.search("shared", 0)?;
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.total_hits, 5);

    index.close()
}

#[test]
fn test_reindexing_replaces_records() -> Result<()> {
    let index = open()?;
    index.index_records(vec![record("u1", "oldname", "first", "x")])?;
    index.index_records(vec![record("u1", "newname", "second", "x")])?;

    assert!(urls(&index, "oldname")?.is_empty());
    assert_eq!(urls(&index, "newname")?, vec!["u1"]);

    let outcome = index.search("second", 10)?;
    assert_eq!(outcome.results[0].description, "second");
    assert_eq!(index.writer().lock().live_docs(), 1);

    index.close()
}

#[test]
fn test_readme_markup_is_not_searchable() -> Result<()> {
    let index = open()?;
    let mut with_readme = record("u1", "docs", "", "x");
    with_readme.readme_html =
        Some(r#"<p>Read the <a href="guide.html">tutorial</a></p>"#.to_string());
    index.index_records(vec![with_readme])?;

    assert_eq!(urls(&index, "tutorial")?, vec!["u1"]);
    assert!(urls(&index, "href")?.is_empty());

    // READMEs are searchable but not stored.
    let outcome = index.search("tutorial", 10)?;
    assert_eq!(outcome.results[0].name, "docs");

    index.close()
}
