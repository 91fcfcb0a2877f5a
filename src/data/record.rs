use std::path::Path;

use super::corpus::RecordId;
use super::header::HeaderRecord;
use super::signal::SignalArray;
use crate::error::RecordError;

// ---------------------------------------------------------------------------
// Full record load (header + signal)
// ---------------------------------------------------------------------------

/// Header and decoded signal of one record.
#[derive(Debug, Clone)]
pub struct Record {
    pub header: HeaderRecord,
    pub signal: SignalArray,
}

impl Record {
    /// `Some((declared, decoded))` when the header's sample count differs from
    /// the decoded signal, or cannot be read.
    pub fn length_mismatch(&self) -> Option<(Option<usize>, usize)> {
        let decoded = self.signal.sample_count();
        match self.header.sample_length() {
            Ok(declared) if declared == decoded => None,
            Ok(declared) => Some((Some(declared), decoded)),
            Err(_) => Some((None, decoded)),
        }
    }
}

/// Load both files of the record at `path` (stem or either sibling file).
/// A declared/decoded length mismatch is logged, not rejected.
pub fn load_record(path: &Path) -> Result<Record, RecordError> {
    let id = RecordId::from_path(path);
    let header = HeaderRecord::load(&id)?;
    let signal = SignalArray::load(&id)?;
    let record = Record { header, signal };
    if let Some((declared, decoded)) = record.length_mismatch() {
        log::warn!(
            "{}: header declares {:?} samples, signal holds {decoded}",
            record.header.record(),
            declared
        );
    }
    Ok(record)
}
