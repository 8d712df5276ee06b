use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use tempfile::TempDir;

use repodex::cli::args::OutputFormat;
use repodex::cli::output::OutputOptions;
use repodex::cli::shell::Shell;
use repodex::config::RepodexConfig;
use repodex::error::Result;
use repodex::repository::RepositoryIndex;
use repodex::source::JsonlSource;
use repodex::storage::memory::MemoryStorage;

const RECORDS: &str = r#"{"id": 1, "url": "https://github.com/acme/foo-bar", "name": "Foo-Bar", "description": "Frobnicates bars", "owner_name": "Alice"}
{"id": 2, "url": "https://github.com/acme/baz", "name": "baz", "description": "Unrelated", "owner_name": "Bob", "readme_html": "<h1>Baz</h1><p>frobnicates too</p>"}
"#;

fn session(script: &str, format: OutputFormat) -> Result<String> {
    let records = TempDir::new()?;
    fs::write(records.path().join("acme.jsonl"), RECORDS)?;
    let source = JsonlSource::new(records.path());

    let index = RepositoryIndex::open(Arc::new(MemoryStorage::new()), RepodexConfig::default())?;
    let options = OutputOptions {
        format,
        pretty: false,
    };
    let mut output = Vec::new();
    Shell::new(&index, &source, options).run(Cursor::new(script.to_string()), &mut output)?;

    assert!(index.writer().lock().is_closed());
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[test]
fn test_index_and_search_session() -> Result<()> {
    let text = session("2 acme\n1 frobnicates\nsearch owner:ALICE\nq\n", OutputFormat::Human)?;

    assert!(text.contains("Indexed 2 repositories of 'acme', skipped 0"));
    assert!(text.contains("Found 2 results, showing top 2"));
    assert!(text.contains("* [Foo-Bar] Frobnicates bars"));
    assert!(text.contains("* [baz] Unrelated"));
    assert!(text.contains("Found 1 results, showing top 1"));
    Ok(())
}

#[test]
fn test_json_session() -> Result<()> {
    let text = session("index acme\nsearch foo\nquit\n", OutputFormat::Json)?;

    let lines: Vec<serde_json::Value> = text
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["indexed"], 2);
    assert_eq!(lines[1]["total_hits"], 1);
    assert_eq!(lines[1]["results"][0]["url"], "https://github.com/acme/foo-bar");
    Ok(())
}

#[test]
fn test_blank_query_returns_to_menu() -> Result<()> {
    let text = session("1\n\nhelp\n", OutputFormat::Human)?;
    assert!(!text.contains("Found"));
    assert!(text.contains("search <query>"));
    Ok(())
}
