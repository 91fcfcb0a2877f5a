//! Decoding and label filtering for 12-lead ECG corpora stored as WFDB
//! header (`.hea`) + MAT signal (`.mat`) pairs.
//!
//! Metadata scans never decode signals: [`enumerate_corpus`] and
//! [`load_header`] read header text only, and [`load_signal`] is a separate
//! call made for the records a caller actually wants.

pub mod config;
pub mod data;
pub mod error;

use std::collections::BTreeSet;
use std::path::Path;

pub use data::catalog::{CodeCatalog, DxCode, RELEVANT_FINDINGS};
pub use data::corpus::{
    enumerate, enumerate_corpus, filter_by_length, partition_counts, LengthRange, RecordId,
};
pub use data::filter::{filtered_labels, LabelCensus};
pub use data::header::HeaderRecord;
pub use data::record::{load_record, Record};
pub use data::signal::{SignalArray, LEAD_COUNT, LEAD_NAMES};
pub use error::{CatalogError, CorpusError, DecodeError, FormatError, LookupError, RecordError};

/// Read the header of the record at `path` (stem or either sibling file).
/// Records already held as a [`RecordId`] go straight to [`HeaderRecord::load`].
pub fn load_header(path: &Path) -> Result<HeaderRecord, FormatError> {
    HeaderRecord::load(&RecordId::from_path(path))
}

/// Decode the signal of the record at `path` (stem or either sibling file).
pub fn load_signal(path: &Path) -> Result<SignalArray, DecodeError> {
    SignalArray::load(&RecordId::from_path(path))
}

/// The header's diagnostic codes restricted to `relevant`.
pub fn header_labels(
    header: &HeaderRecord,
    relevant: &BTreeSet<DxCode>,
) -> Result<Vec<DxCode>, FormatError> {
    Ok(filtered_labels(&header.diagnostic_codes()?, relevant))
}
