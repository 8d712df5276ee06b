//! Command line argument parsing for the Repodex CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Repodex - near-real-time search over GitHub repositories
#[derive(Parser, Debug, Clone)]
#[command(name = "repodex")]
#[command(about = "Index GitHub organizations and search their repositories")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct RepodexArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Directory holding the index
    #[arg(
        long,
        env = "REPODEX_INDEX_DIR",
        default_value = "repodex-index",
        global = true
    )]
    pub index_dir: PathBuf,

    /// Keep the index in memory instead of on disk
    #[arg(long, global = true)]
    pub memory: bool,

    /// JSON configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Read records from `<DIR>/<org>.jsonl` instead of GitHub
    #[arg(long, value_name = "DIR", global = true)]
    pub records_dir: Option<PathBuf>,

    /// Subcommand to execute (interactive shell if omitted)
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl RepodexArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the interactive shell
    Shell,

    /// Search the index
    Search(SearchArgs),

    /// Fetch and index every repository of an organization
    Index(IndexArgs),
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for indexing
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Organization name
    #[arg(value_name = "ORG")]
    pub organization: String,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_command() {
        let args =
            RepodexArgs::try_parse_from(["repodex", "search", "owner:alice", "--limit", "5"])
                .unwrap();

        if let Some(Command::Search(search_args)) = args.command {
            assert_eq!(search_args.query, "owner:alice");
            assert_eq!(search_args.limit, Some(5));
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_index_command_with_global_flags() {
        let args = RepodexArgs::try_parse_from([
            "repodex",
            "index",
            "acme",
            "--memory",
            "--records-dir",
            "/tmp/records",
        ])
        .unwrap();

        assert!(args.memory);
        assert_eq!(args.records_dir, Some(PathBuf::from("/tmp/records")));
        assert!(matches!(args.command, Some(Command::Index(ref a)) if a.organization == "acme"));
    }

    #[test]
    fn test_shell_is_default() {
        let args = RepodexArgs::try_parse_from(["repodex"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = RepodexArgs::try_parse_from(["repodex", "shell"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = RepodexArgs::try_parse_from(["repodex", "-vv", "shell"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = RepodexArgs::try_parse_from(["repodex", "--quiet", "-vvv", "shell"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            RepodexArgs::try_parse_from(["repodex", "--format", "json", "search", "x"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
