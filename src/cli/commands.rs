//! Command implementations for the Repodex CLI.

use std::io::{self, Write};
use std::sync::Arc;

use log::{debug, info};

use crate::cli::args::{Command, IndexArgs, RepodexArgs, SearchArgs};
use crate::cli::output::{self, OutputOptions};
use crate::cli::shell::Shell;
use crate::config::RepodexConfig;
use crate::error::Result;
use crate::repository::RepositoryIndex;
use crate::source::{GitHubSource, JsonlSource, RecordSource};
use crate::storage::Storage;
use crate::storage::file::FileStorage;
use crate::storage::memory::MemoryStorage;

/// Execute a CLI command.
pub fn execute_command(args: RepodexArgs) -> Result<()> {
    let index = open_index(&args)?;
    let options = OutputOptions {
        format: args.output_format,
        pretty: args.pretty,
    };

    let result = match &args.command {
        None | Some(Command::Shell) => run_shell(&index, &args, options),
        Some(Command::Search(search_args)) => search(&index, search_args, options),
        Some(Command::Index(index_args)) => index_organization(&index, index_args, &args, options),
    };

    // Close even when the command failed; report the command's error first.
    let closed = index.close();
    result.and(closed)
}

/// Load the configuration and open the index the arguments point at.
fn open_index(args: &RepodexArgs) -> Result<RepositoryIndex> {
    let config = match &args.config {
        Some(path) => {
            debug!("loading configuration from {}", path.display());
            RepodexConfig::load(path)?
        }
        None => RepodexConfig::default(),
    };

    let storage: Arc<dyn Storage> = if args.memory {
        info!("using in-memory index");
        Arc::new(MemoryStorage::new())
    } else {
        info!("using index at {}", args.index_dir.display());
        Arc::new(FileStorage::new(&args.index_dir)?)
    };

    RepositoryIndex::open(storage, config)
}

fn record_source(args: &RepodexArgs) -> Result<Box<dyn RecordSource>> {
    match &args.records_dir {
        Some(dir) => Ok(Box::new(JsonlSource::new(dir))),
        None => Ok(Box::new(GitHubSource::new(args.token.clone())?)),
    }
}

fn run_shell(index: &RepositoryIndex, args: &RepodexArgs, options: OutputOptions) -> Result<()> {
    let source = record_source(args)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    Shell::new(index, source.as_ref(), options).run(stdin.lock(), &mut stdout)
}

fn search(index: &RepositoryIndex, args: &SearchArgs, options: OutputOptions) -> Result<()> {
    let limit = args.limit.unwrap_or_else(|| index.default_limit());
    let outcome = index.search(&args.query, limit)?;

    let mut stdout = io::stdout().lock();
    output::write_search(&mut stdout, &outcome, options)?;
    stdout.flush()?;
    Ok(())
}

fn index_organization(
    index: &RepositoryIndex,
    args: &IndexArgs,
    cli_args: &RepodexArgs,
    options: OutputOptions,
) -> Result<()> {
    let source = record_source(cli_args)?;
    let report = index.index_organization(source.as_ref(), &args.organization)?;

    let mut stdout = io::stdout().lock();
    output::write_indexing(&mut stdout, &args.organization, &report, options)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_index_and_search_from_records_dir() {
        let records = TempDir::new().unwrap();
        fs::write(
            records.path().join("acme.jsonl"),
            r#"{"id": 1, "url": "https://github.com/acme/rocket", "name": "rocket", "description": "Launches things"}"#,
        )
        .unwrap();
        let index_dir = TempDir::new().unwrap();

        let index_dir_arg = index_dir.path().to_str().unwrap();
        let records_arg = records.path().to_str().unwrap();

        let args = RepodexArgs::try_parse_from([
            "repodex",
            "--index-dir",
            index_dir_arg,
            "--records-dir",
            records_arg,
            "index",
            "acme",
        ])
        .unwrap();
        execute_command(args).unwrap();

        let args = RepodexArgs::try_parse_from([
            "repodex",
            "--index-dir",
            index_dir_arg,
            "search",
            "launches",
        ])
        .unwrap();
        let index = open_index(&args).unwrap();
        let outcome = index.search("launches", 10).unwrap();
        assert_eq!(outcome.total_hits, 1);
        index.close().unwrap();

        execute_command(args).unwrap();
    }

    #[test]
    fn test_bad_config_fails_before_opening() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("bad.json");
        fs::write(&config, r#"{"default_limit": 0}"#).unwrap();

        let args = RepodexArgs::try_parse_from([
            "repodex",
            "--memory",
            "--config",
            config.to_str().unwrap(),
            "search",
            "x",
        ])
        .unwrap();
        assert!(execute_command(args).is_err());
    }
}
