//! Interactive menu for searching and indexing.

use std::io::{BufRead, Write};

use log::warn;

use crate::cli::output::{self, OutputOptions};
use crate::error::Result;
use crate::repository::RepositoryIndex;
use crate::source::RecordSource;

const MENU: &str = "Please select an option:
1. Search in index
2. Index a GitHub organization
Q. Quit";

/// Menu choice read from one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Choice {
    /// Search, with the query if it was given on the same line
    Search(Option<String>),
    /// Index, with the organization if it was given on the same line
    Index(Option<String>),
    Help,
    Quit,
    Empty,
    Unrecognized(String),
}

impl Choice {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Choice::Empty;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest.trim().to_string())),
            None => (line, None),
        };
        let rest = rest.filter(|r| !r.is_empty());

        match word.to_lowercase().as_str() {
            "1" | "search" => Choice::Search(rest),
            "2" | "index" => Choice::Index(rest),
            "h" | "help" | "?" => Choice::Help,
            "q" | "quit" | "exit" => Choice::Quit,
            _ => Choice::Unrecognized(line.to_string()),
        }
    }
}

/// Line-driven shell over a [`RepositoryIndex`].
pub struct Shell<'a> {
    index: &'a RepositoryIndex,
    source: &'a dyn RecordSource,
    options: OutputOptions,
}

impl<'a> Shell<'a> {
    pub fn new(
        index: &'a RepositoryIndex,
        source: &'a dyn RecordSource,
        options: OutputOptions,
    ) -> Self {
        Shell {
            index,
            source,
            options,
        }
    }

    /// Run until `quit` or end of input, then close the index.
    ///
    /// Failed searches and indexing runs are reported on `output` and the
    /// shell keeps going. Only I/O errors on `input`/`output` and a failed
    /// close end the run with an error.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, output: &mut W) -> Result<()> {
        writeln!(output, "Welcome to repodex!")?;

        loop {
            writeln!(output)?;
            writeln!(output, "{MENU}")?;
            output.flush()?;

            let Some(line) = read_line(&mut input)? else {
                break;
            };

            match Choice::parse(&line) {
                Choice::Search(query) => {
                    let query = match query {
                        Some(query) => query,
                        None => match prompt(&mut input, output, "Please type a search query: ")? {
                            Some(query) => query,
                            None => break,
                        },
                    };
                    if !query.is_empty() {
                        self.search(&query, output)?;
                    }
                }
                Choice::Index(organization) => {
                    let organization = match organization {
                        Some(organization) => organization,
                        None => {
                            match prompt(&mut input, output, "Please type an organization name: ")?
                            {
                                Some(organization) => organization,
                                None => break,
                            }
                        }
                    };
                    if !organization.is_empty() {
                        self.index(&organization, output)?;
                    }
                }
                Choice::Help => {
                    writeln!(
                        output,
                        "search <query> (or 1) searches name, description and readme"
                    )?;
                    writeln!(
                        output,
                        "index <organization> (or 2) fetches and indexes an organization"
                    )?;
                    writeln!(output, "quit (or q) closes the index and exits")?;
                }
                Choice::Quit => break,
                Choice::Empty => {}
                Choice::Unrecognized(_) => writeln!(output, "Unrecognized option")?,
            }
        }

        self.index.close()
    }

    fn search<W: Write>(&self, query: &str, output: &mut W) -> Result<()> {
        writeln!(output)?;
        match self.index.search(query, self.index.default_limit()) {
            Ok(outcome) => output::write_search(output, &outcome, self.options),
            Err(e) => {
                warn!("search for '{query}' failed: {e}");
                writeln!(output, "Found 0 results (error: {e})")?;
                Ok(())
            }
        }
    }

    fn index<W: Write>(&self, organization: &str, output: &mut W) -> Result<()> {
        writeln!(output, "Reading repositories of '{organization}'...")?;
        output.flush()?;
        match self.index.index_organization(self.source, organization) {
            Ok(report) => output::write_indexing(output, organization, &report, self.options),
            Err(e) => {
                warn!("indexing '{organization}' failed: {e}");
                writeln!(output, "Indexing failed: {e}")?;
                Ok(())
            }
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    text: &str,
) -> Result<Option<String>> {
    writeln!(output, "{text}")?;
    output.flush()?;
    read_line(input)
}
