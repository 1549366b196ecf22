pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod housekeeping;
pub mod report;
pub mod scanner;
pub mod utils;

pub use cli::{Cli, Command};
pub use config::{Config, DedupeOptions, SortRules};
pub use duplicates::{
    DeletionReport, ScanOutcome, SeenTable, SkippedFile, find_and_delete_duplicates,
    find_and_delete_duplicates_until,
};
pub use error::{ConfigError, FileAccessError};
pub use housekeeping::{CleanReport, SortReport, clean_directory, sort_directory};
pub use scanner::{calculate_file_hash, walk_files};
pub use utils::{FileRecord, Fingerprint, format_human_elapsed};
