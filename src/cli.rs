// src/cli.rs
//! Argument parsing for the `blockvault` binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "blockvault")]
#[command(author, version, about = "Incremental, content-addressed file-tree backup", long_about = None)]
pub struct Cli {
    /// Destination root holding every historical set plus the in-progress one
    #[arg(short = 'd', long)]
    pub destination: PathBuf,

    /// Glob-like pattern to exclude; may be given multiple times
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Compute and log everything without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Log a line for every block processed
    #[arg(long)]
    pub show_block_progress: bool,

    /// Log a line for every file visited
    #[arg(long)]
    pub show_file_progress: bool,

    /// Raise the log level; repeat for more detail
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// One or more source directory trees to back up
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}
