//! Error taxonomy for the decoding layer.
//!
//! Every error that concerns a single recording carries its [`RecordId`] so a
//! caller can report which files need manual inspection.

use std::path::PathBuf;

use crate::data::catalog::DxCode;
use crate::data::corpus::RecordId;

/// Header text does not follow the fixed-offset layout.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("{record}: cannot read header file: {source}")]
    Io {
        record: RecordId,
        #[source]
        source: std::io::Error,
    },

    #[error("{record}: header has {found} lines, line {line} ({field}) is missing")]
    MissingLine {
        record: RecordId,
        line: usize,
        field: &'static str,
        found: usize,
    },

    #[error("{record}: header line {line} has {found} tokens, expected at least {expected}")]
    MissingToken {
        record: RecordId,
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("{record}: header line {line} should start with '{expected}', got '{text}'")]
    UnexpectedLabel {
        record: RecordId,
        line: usize,
        expected: &'static str,
        text: String,
    },

    #[error("{record}: {field} on header line {line} is not an integer: '{value}'")]
    NotAnInteger {
        record: RecordId,
        line: usize,
        field: &'static str,
        value: String,
    },
}

impl FormatError {
    /// The recording whose header failed to parse.
    pub fn record(&self) -> &RecordId {
        match self {
            FormatError::Io { record, .. }
            | FormatError::MissingLine { record, .. }
            | FormatError::MissingToken { record, .. }
            | FormatError::UnexpectedLabel { record, .. }
            | FormatError::NotAnInteger { record, .. } => record,
        }
    }
}

/// Signal payload is absent, truncated, or of the wrong shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{record}: cannot read signal file: {source}")]
    Io {
        record: RecordId,
        #[source]
        source: std::io::Error,
    },

    #[error("{record}: signal file is truncated ({detail})")]
    Truncated { record: RecordId, detail: String },

    #[error("{record}: malformed signal file ({detail})")]
    Malformed { record: RecordId, detail: String },

    #[error("{record}: unsupported signal encoding ({detail})")]
    Unsupported { record: RecordId, detail: String },

    #[error("{record}: signal file has no '{name}' matrix")]
    MissingVariable { record: RecordId, name: String },

    #[error("{record}: signal has {found} channels, expected {expected}")]
    ChannelCount {
        record: RecordId,
        found: usize,
        expected: usize,
    },
}

impl DecodeError {
    /// The recording whose signal failed to decode.
    pub fn record(&self) -> &RecordId {
        match self {
            DecodeError::Io { record, .. }
            | DecodeError::Truncated { record, .. }
            | DecodeError::Malformed { record, .. }
            | DecodeError::Unsupported { record, .. }
            | DecodeError::MissingVariable { record, .. }
            | DecodeError::ChannelCount { record, .. } => record,
        }
    }
}

/// Code catalog miss.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("diagnostic code {0} is not in the catalog")]
    UnknownCode(DxCode),

    #[error("no diagnostic code is described as '{0}'")]
    UnknownDescription(String),

    #[error("description '{description}' maps to several codes: {codes:?}")]
    AmbiguousDescription {
        description: String,
        codes: Vec<DxCode>,
    },
}

/// Failure reading or writing the catalog's backing CSV.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failure while indexing a corpus directory tree.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("{path}: cannot list directory: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Header(#[from] FormatError),
}

/// Failure of a combined header + signal load.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Header(#[from] FormatError),

    #[error(transparent)]
    Signal(#[from] DecodeError),
}
