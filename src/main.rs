// src/main.rs

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use blockvault::cli::Cli;
use blockvault::exclude::ExcludeSet;
use blockvault::progress::{LoggingProgress, SilentProgress};
use blockvault::session::{self, RunOutcome, SessionConfig, Summary};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let exclude = ExcludeSet::compile(&cli.exclude).context("compiling exclude patterns")?;

    let progress: Box<dyn blockvault::progress::ProgressSink> =
        if cli.show_block_progress || cli.show_file_progress {
            Box::new(LoggingProgress::new(cli.show_file_progress, cli.show_block_progress))
        } else {
            Box::new(SilentProgress)
        };

    let config = SessionConfig {
        destination: cli.destination,
        sources: cli.sources,
        exclude,
        dry_run: cli.dry_run,
        progress,
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupted.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    match session::run(config, interrupted)? {
        RunOutcome::Completed(summary) => {
            print_statistics(&summary);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Interrupted => {
            eprintln!("interrupted; in-progress set left in place for resumption");
            Ok(ExitCode::from(130))
        }
    }
}

fn print_statistics(summary: &Summary) {
    let c = &summary.counters;
    println!(
        "set: {}{}",
        summary.destination_set.display(),
        if summary.dry_run { " (dry run)" } else { "" }
    );
    if let Some(reference) = &summary.reference_set {
        println!("reference: {}", reference.display());
    } else {
        println!("reference: none");
    }
    println!("catalog entries: {}", c.catalog_entries);
    println!("directories: {}", c.directories);
    println!("symlinks: {}", c.symbolic_links);
    println!("excluded paths: {}", c.excluded_paths);
    println!(
        "regular files: {} changed, {} unchanged",
        c.changed_files, c.unchanged_files
    );
    println!(
        "blocks: {} processed ({} created, {} duplicate, {} linked)",
        c.processed_blocks, c.created_blocks, c.duplicate_blocks, c.linked_blocks
    );
    if c.reference_blocks_missing > 0 {
        println!(
            "warning: {} reference blocks were missing on disk",
            c.reference_blocks_missing
        );
    }
}
