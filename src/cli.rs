use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sweep-dups", version)]
#[command(about = "Remove duplicate files, clean temp folders and sort files by type")]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write the log to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Delete every file whose content was already seen earlier in the scan
    Dedupe {
        /// Directories to scan, in order. The first copy found is kept.
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// List duplicates without deleting them
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Number of parallel hashing threads (default: 1, or the config value)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Ignore files smaller than this many bytes
        #[arg(short, long)]
        min_size: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every file under a temp directory
    CleanTmp {
        /// Directory to empty (default: the system temp directory)
        dir: Option<PathBuf>,

        /// List files without deleting them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Move files into sub folders by file type
    SortFiles {
        /// Directory whose files are sorted (default: the config value, else ~/Downloads)
        dir: Option<PathBuf>,

        /// Show the moves without doing them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}
