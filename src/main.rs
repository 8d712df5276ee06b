//! Repodex CLI binary.

use std::io::Write;
use std::process;

use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use repodex::cli::args::RepodexArgs;
use repodex::cli::commands::execute_command;

fn run(args: RepodexArgs) -> anyhow::Result<()> {
    let index_dir = args.index_dir.clone();
    let in_memory = args.memory;
    execute_command(args).with_context(|| {
        if in_memory {
            "in-memory index".to_string()
        } else {
            format!("index at {}", index_dir.display())
        }
    })
}

fn main() {
    let args = RepodexArgs::parse();

    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
