//! Glyph: operator CLI for the file archive.
//!
//! ```text
//! glyph add report.pdf --title "Q3 Report" --tags finance,2024
//! glyph verify archive/report.pdf
//! glyph verify-all --limit 100
//! glyph list
//! glyph audit
//! ```
//!
//! Exit status is 0 on success, 1 on an integrity failure (mismatch, broken
//! audit chain) or any error.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use glyph_archive::ProvidedMetadata;

/// Glyph: content-addressed file archive with a tamper-evident audit trail
#[derive(Parser, Debug)]
#[command(name = "glyph", version)]
#[command(about = "Archive files, verify their integrity and inspect the audit trail")]
struct Args {
    /// Settings file (JSON). Defaults to config/settings.json when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a file
    Add {
        file: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,

        /// Skip re-hashing source and copy after copying
        #[arg(long)]
        no_verify: bool,
    },

    /// Re-check an archived file against its recorded hash
    Verify {
        /// Archived file path (same as --path)
        target: Option<PathBuf>,

        #[arg(long)]
        id: Option<i64>,

        #[arg(long)]
        hash: Option<String>,

        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Verify the most recently added entries
    VerifyAll {
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Show the most recently added entries
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay the audit log and check its hash chain
    Audit,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = config::load_config(args.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    let mut service = commands::open_service(config)?;

    match args.command {
        Command::Add {
            file,
            title,
            author,
            tags,
            no_verify,
        } => {
            let metadata = ProvidedMetadata {
                title,
                author,
                tags: ProvidedMetadata::parse_tags(&tags),
                ..Default::default()
            };
            commands::add(&mut service, &file, metadata, !no_verify)
        }
        Command::Verify {
            target,
            id,
            hash,
            path,
        } => commands::verify(&mut service, id, hash, path.or(target)),
        Command::VerifyAll { limit } => commands::verify_all(&mut service, limit),
        Command::List { limit, json } => commands::list(&service, limit, json),
        Command::Audit => commands::audit(&service),
    }
}
