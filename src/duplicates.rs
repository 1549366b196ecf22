//! Duplicate elimination.
//!
//! One call walks every root in order, fingerprints each regular file and
//! deletes any file whose fingerprint was already seen earlier in the same
//! call. The first file with a given fingerprint is the canonical copy and is
//! never touched.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::DedupeOptions;
use crate::error::{ConfigError, FileAccessError};
use crate::scanner::{Candidate, Root, calculate_file_hash, validate_roots, walk_files};
use crate::utils::{FileRecord, Fingerprint};

/// Fingerprint to canonical file, for the lifetime of one scan.
#[derive(Debug, Default)]
pub struct SeenTable {
    by_fingerprint: HashMap<Fingerprint, FileRecord>,
}

impl SeenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `record` as canonical if its fingerprint is new. Otherwise
    /// returns the canonical record it duplicates.
    pub fn observe(&mut self, record: FileRecord) -> Option<&FileRecord> {
        match self.by_fingerprint.entry(record.fingerprint) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => {
                entry.insert(record);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

/// Paths removed by one scan, in the order they were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    paths: Vec<PathBuf>,
    bytes_reclaimed: u64,
}

impl DeletionReport {
    fn push(&mut self, path: PathBuf, size: u64) {
        self.paths.push(path);
        self.bytes_reclaimed += size;
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_reclaimed
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

impl<'a> IntoIterator for &'a DeletionReport {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// A file left alone because it could not be read, deleted or moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: Option<PathBuf>,
    pub reason: String,
}

impl From<FileAccessError> for SkippedFile {
    fn from(err: FileAccessError) -> Self {
        Self {
            path: err.path().map(Path::to_path_buf),
            reason: err.to_string(),
        }
    }
}

/// Everything one scan produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub deleted: DeletionReport,
    pub skipped: Vec<SkippedFile>,
    pub files_scanned: u64,
    /// Nothing was removed; `deleted` lists what would have been.
    pub dry_run: bool,
    /// The scan was stopped before it reached every file.
    pub interrupted: bool,
}

/// Finds files with identical content under `roots` and deletes every copy
/// but the first one encountered.
///
/// All roots are checked before anything is walked, so a bad root leaves
/// the filesystem untouched. Files that cannot be read or deleted are listed
/// in [`ScanOutcome::skipped`] and the scan carries on.
pub fn find_and_delete_duplicates<P: AsRef<Path>>(
    roots: &[P],
    options: &DedupeOptions,
) -> Result<ScanOutcome, ConfigError> {
    let never = AtomicBool::new(false);
    find_and_delete_duplicates_until(roots, options, &never)
}

/// Like [`find_and_delete_duplicates`], but stops before the next file once
/// `stop` is set and returns what was done so far.
pub fn find_and_delete_duplicates_until<P: AsRef<Path>>(
    roots: &[P],
    options: &DedupeOptions,
    stop: &AtomicBool,
) -> Result<ScanOutcome, ConfigError> {
    let roots = validate_roots(roots)?;
    for root in &roots {
        info!("Scanning '{}'", root.given.display());
    }

    let mut eliminator = Eliminator::new(options, stop);
    if options.threads > 1 {
        eliminator.run_parallel(&roots);
    } else {
        eliminator.run_sequential(&roots);
    }
    Ok(eliminator.finish())
}

struct Eliminator<'a> {
    options: &'a DedupeOptions,
    stop: &'a AtomicBool,
    seen: SeenTable,
    // Resolved paths already visited, so overlapping roots never compare a
    // file with itself.
    visited: HashSet<PathBuf>,
    outcome: ScanOutcome,
    progress: ProgressBar,
}

impl<'a> Eliminator<'a> {
    fn new(options: &'a DedupeOptions, stop: &'a AtomicBool) -> Self {
        let progress = if options.progress {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self {
            options,
            stop,
            seen: SeenTable::new(),
            visited: HashSet::new(),
            outcome: ScanOutcome {
                dry_run: options.dry_run,
                ..ScanOutcome::default()
            },
            progress,
        }
    }

    fn stop_requested(&mut self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            if !self.outcome.interrupted {
                warn!("Scan interrupted, stopping before the next file");
            }
            self.outcome.interrupted = true;
        }
        self.outcome.interrupted
    }

    /// Applies the visit and size filters. Returns false for files the scan
    /// should not consider.
    fn admit(&mut self, root: &Root, candidate: &Candidate) -> bool {
        if !self.visited.insert(root.resolve(&candidate.path)) {
            debug!("Already visited: '{}'", candidate.path.display());
            return false;
        }
        if candidate.size < self.options.min_size {
            debug!(
                "Skipping small file: '{}' ({} bytes)",
                candidate.path.display(),
                candidate.size
            );
            return false;
        }
        true
    }

    fn run_sequential(&mut self, roots: &[Root]) {
        self.progress.set_message("Scanning files...");
        for root in roots {
            for item in walk_files(&root.given) {
                if self.stop_requested() {
                    return;
                }
                let candidate = match item {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        self.skip(e);
                        continue;
                    }
                };
                if !self.admit(root, &candidate) {
                    continue;
                }
                self.process(candidate);
            }
        }
    }

    fn process(&mut self, candidate: Candidate) {
        let hashed = calculate_file_hash(&candidate.path);
        self.resolve(candidate, hashed);
    }

    /// Collects every candidate in walk order first, hashes them on a local
    /// pool, then resolves them in the collected order. Canonical choice is
    /// the same as in a sequential run.
    fn run_parallel(&mut self, roots: &[Root]) {
        self.progress.set_message("Listing files...");
        let mut candidates = Vec::new();
        for root in roots {
            for item in walk_files(&root.given) {
                if self.stop_requested() {
                    return;
                }
                match item {
                    Ok(candidate) => {
                        if self.admit(root, &candidate) {
                            candidates.push(candidate);
                        }
                    }
                    Err(e) => self.skip(e),
                }
            }
        }
        let total_bytes: u64 = candidates.iter().map(|c| c.size).sum();
        info!(
            "Found {} files ({}), hashing on {} threads",
            HumanCount(candidates.len() as u64),
            HumanBytes(total_bytes),
            self.options.threads
        );

        if self.options.progress {
            self.progress.finish_and_clear();
            self.progress = ProgressBar::new(candidates.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg} ETA: {eta}",
            ) {
                self.progress.set_style(style.progress_chars("#>-"));
            }
        }

        let stop = self.stop;
        let progress = &self.progress;
        let hash_one = |candidate: &Candidate| {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let hashed = calculate_file_hash(&candidate.path);
            progress.inc(1);
            Some(hashed)
        };
        let hashes: Vec<Option<Result<Fingerprint, FileAccessError>>> =
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .build()
            {
                Ok(pool) => pool.install(|| candidates.par_iter().map(hash_one).collect()),
                Err(e) => {
                    warn!("Failed to start hashing threads ({}), hashing sequentially", e);
                    candidates.iter().map(hash_one).collect()
                }
            };

        for (candidate, hashed) in candidates.into_iter().zip(hashes) {
            match hashed {
                Some(hashed) if !self.stop_requested() => self.resolve(candidate, hashed),
                _ => {
                    self.stop_requested();
                    return;
                }
            }
        }
    }

    fn resolve(&mut self, candidate: Candidate, hashed: Result<Fingerprint, FileAccessError>) {
        self.outcome.files_scanned += 1;
        self.progress.set_message(format!(
            "Scanned {} files",
            HumanCount(self.outcome.files_scanned)
        ));

        let fingerprint = match hashed {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                self.skip(e);
                return;
            }
        };
        let Candidate { path, size } = candidate;
        let record = FileRecord {
            path: path.clone(),
            size,
            fingerprint,
        };
        let canonical = match self.seen.observe(record) {
            None => return,
            Some(canonical) => canonical.path.clone(),
        };
        self.remove_duplicate(path, size, &canonical);
    }

    fn remove_duplicate(&mut self, path: PathBuf, size: u64, canonical: &Path) {
        if self.options.dry_run {
            info!(
                "Would delete duplicate: '{}' (same as '{}')",
                path.display(),
                canonical.display()
            );
            self.outcome.deleted.push(path, size);
            return;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(
                    "Deleted duplicate: '{}' (same as '{}')",
                    path.display(),
                    canonical.display()
                );
                self.outcome.deleted.push(path, size);
            }
            Err(source) => self.skip(FileAccessError::Delete { path, source }),
        }
    }

    fn skip(&mut self, err: FileAccessError) {
        warn!("Skipping: {}", err);
        self.outcome.skipped.push(SkippedFile::from(err));
    }

    fn finish(self) -> ScanOutcome {
        self.progress.finish_and_clear();
        info!(
            "Scan complete: {} files hashed, {} unique, {} duplicates ({}), {} skipped",
            HumanCount(self.outcome.files_scanned),
            HumanCount(self.seen.len() as u64),
            HumanCount(self.outcome.deleted.len() as u64),
            HumanBytes(self.outcome.deleted.bytes_reclaimed()),
            HumanCount(self.outcome.skipped.len() as u64)
        );
        self.outcome
    }
}
