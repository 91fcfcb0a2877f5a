use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::header::{HeaderRecord, HEADER_EXTENSION};
use super::signal::SIGNAL_EXTENSION;
use crate::error::CorpusError;

// ---------------------------------------------------------------------------
// RecordId – the shared stem of a header/signal pair
// ---------------------------------------------------------------------------

/// Path stem naming one recording, e.g. `data/samples/cpsc_2018/A0001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(PathBuf);

impl RecordId {
    /// Record named by `path`: the bare stem, or either of its `.hea`/`.mat`
    /// files. Any other dotted suffix is part of the stem (`HR.00001`).
    pub fn from_path(path: &Path) -> Self {
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == HEADER_EXTENSION || e == SIGNAL_EXTENSION);
        if known {
            RecordId(path.with_extension(""))
        } else {
            RecordId(path.to_path_buf())
        }
    }

    /// Stem of a file found in a partition, with its final extension removed
    /// whatever it is.
    fn from_file(path: &Path) -> Self {
        RecordId(path.with_extension(""))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name of the stem, e.g. `A0001`.
    pub fn stem(&self) -> &str {
        self.0.file_name().and_then(|s| s.to_str()).unwrap_or("")
    }

    pub fn header_path(&self) -> PathBuf {
        self.sibling(HEADER_EXTENSION)
    }

    pub fn signal_path(&self) -> PathBuf {
        self.sibling(SIGNAL_EXTENSION)
    }

    /// `<stem>.<extension>`, appended so a dotted stem keeps its suffix.
    fn sibling(&self, extension: &str) -> PathBuf {
        let mut path = self.0.clone().into_os_string();
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// ---------------------------------------------------------------------------
// LengthRange – inclusive bounds on the declared sample count
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthRange {
    pub min: usize,
    pub max: usize,
}

impl LengthRange {
    /// `[min, max]`, inclusive. An inverted range matches nothing.
    pub fn between(min: usize, max: usize) -> Self {
        LengthRange { min, max }
    }

    /// Exactly `length` samples.
    pub fn exact(length: usize) -> Self {
        LengthRange {
            min: length,
            max: length,
        }
    }

    pub fn contains(&self, length: usize) -> bool {
        self.min <= length && length <= self.max
    }
}

// ---------------------------------------------------------------------------
// Corpus indexing (header-only)
// ---------------------------------------------------------------------------

/// Records under `root`: one level of dataset partitions, each holding
/// header/signal pairs. Partitions are visited in name order; stems within a
/// partition are sorted and deduplicated. Dotfiles are ignored.
pub fn enumerate(root: &Path) -> Result<Vec<RecordId>, CorpusError> {
    let mut records = Vec::new();
    for partition in partitions(root)? {
        records.extend(partition_records(&partition)?);
    }
    log::info!("found {} records under {}", records.len(), root.display());
    Ok(records)
}

/// Keep records whose declared sample count is within `range`.
///
/// Only headers are read. Each header must also carry a parseable `Dx:`
/// line, since label filtering runs on whatever this pass keeps. The first
/// malformed or unreadable header aborts the whole pass.
pub fn filter_by_length(
    records: Vec<RecordId>,
    range: LengthRange,
) -> Result<Vec<RecordId>, CorpusError> {
    let total = records.len();
    let mut kept = Vec::with_capacity(total);
    for record in records {
        let header = HeaderRecord::load(&record)?;
        let length = header.sample_length()?;
        header.diagnostic_codes()?;
        if range.contains(length) {
            kept.push(record);
        }
    }
    log::info!(
        "kept {} of {total} records with {} <= length <= {}",
        kept.len(),
        range.min,
        range.max
    );
    Ok(kept)
}

/// [`enumerate`] followed by an optional [`filter_by_length`].
pub fn enumerate_corpus(
    root: &Path,
    length_range: Option<LengthRange>,
) -> Result<Vec<RecordId>, CorpusError> {
    let records = enumerate(root)?;
    match length_range {
        Some(range) => filter_by_length(records, range),
        None => Ok(records),
    }
}

/// `(partition name, record count)` for each dataset partition under `root`.
pub fn partition_counts(root: &Path) -> Result<Vec<(String, usize)>, CorpusError> {
    partitions(root)?
        .into_iter()
        .map(|dir| {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((name, partition_records(&dir)?.len()))
        })
        .collect()
}

fn partitions(root: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let mut dirs = Vec::new();
    for entry in read_dir(root)? {
        let entry = entry.map_err(|source| io_error(root, source))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn partition_records(dir: &Path) -> Result<BTreeSet<RecordId>, CorpusError> {
    let mut stems = BTreeSet::new();
    for entry in read_dir(dir)? {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !path.is_file() {
            continue;
        }
        stems.insert(RecordId::from_file(&path));
    }
    log::debug!("{}: {} records", dir.display(), stems.len());
    Ok(stems)
}

fn read_dir(dir: &Path) -> Result<std::fs::ReadDir, CorpusError> {
    std::fs::read_dir(dir).map_err(|source| io_error(dir, source))
}

fn io_error(path: &Path, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.to_path_buf(),
        source,
    }
}
