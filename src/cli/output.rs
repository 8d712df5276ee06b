//! Output formatting for CLI commands.

use std::io::Write;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::Result;
use crate::repository::{IndexingReport, SearchOutcome};

/// How results are written.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        OutputOptions {
            format: OutputFormat::Human,
            pretty: false,
        }
    }
}

/// Write search results.
pub fn write_search<W: Write>(
    out: &mut W,
    outcome: &SearchOutcome,
    options: OutputOptions,
) -> Result<()> {
    match options.format {
        OutputFormat::Human => write_search_human(out, outcome),
        OutputFormat::Json => write_json(out, outcome, options.pretty),
    }
}

/// Write the report of an indexing run.
pub fn write_indexing<W: Write>(
    out: &mut W,
    organization: &str,
    report: &IndexingReport,
    options: OutputOptions,
) -> Result<()> {
    match options.format {
        OutputFormat::Human => write_indexing_human(out, organization, report),
        OutputFormat::Json => write_json(out, report, options.pretty),
    }
}

fn write_search_human<W: Write>(out: &mut W, outcome: &SearchOutcome) -> Result<()> {
    writeln!(
        out,
        "Found {} results, showing top {}",
        outcome.total_hits,
        outcome.results.len()
    )?;
    for result in &outcome.results {
        writeln!(out, "* [{}] {}", result.name, one_line(&result.description))?;
    }
    Ok(())
}

fn write_indexing_human<W: Write>(
    out: &mut W,
    organization: &str,
    report: &IndexingReport,
) -> Result<()> {
    writeln!(
        out,
        "Indexed {} repositories of '{organization}', skipped {}",
        report.indexed,
        report.skipped.len()
    )?;
    for skipped in &report.skipped {
        writeln!(out, "  skipped '{}': {}", skipped.key, skipped.reason)?;
    }
    Ok(())
}

fn write_json<W: Write, T: Serialize>(out: &mut W, result: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    writeln!(out, "{json}")?;
    Ok(())
}

/// Collapse whitespace runs so a description prints on one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::writer::SkippedDocument;
    use crate::repository::SearchResult;

    fn outcome() -> SearchOutcome {
        SearchOutcome {
            results: vec![SearchResult {
                name: "Foo-Bar".to_string(),
                description: "A foo\nthat bars".to_string(),
                url: "https://github.com/alice/foo-bar".to_string(),
                score: 1.5,
            }],
            total_hits: 3,
        }
    }

    #[test]
    fn test_search_human() {
        let mut out = Vec::new();
        write_search(&mut out, &outcome(), OutputOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Found 3 results, showing top 1\n* [Foo-Bar] A foo that bars\n"
        );
    }

    #[test]
    fn test_search_json() {
        let mut out = Vec::new();
        let options = OutputOptions {
            format: OutputFormat::Json,
            pretty: false,
        };
        write_search(&mut out, &outcome(), options).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total_hits"], 3);
        assert_eq!(value["results"][0]["name"], "Foo-Bar");
    }

    #[test]
    fn test_indexing_human() {
        let report = IndexingReport {
            indexed: 2,
            skipped: vec![SkippedDocument {
                key: "".to_string(),
                reason: "empty key".to_string(),
            }],
            generation: 1,
        };
        let mut out = Vec::new();
        write_indexing(&mut out, "acme", &report, OutputOptions::default()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Indexed 2 repositories of 'acme', skipped 1\n"));
        assert!(text.contains("empty key"));
    }
}
