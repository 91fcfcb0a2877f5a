use ndarray::{Array2, ArrayView1};

use super::corpus::RecordId;
use super::matfile::{self, MatError};
use crate::error::DecodeError;

/// Extension of the binary signal payload of a record.
pub const SIGNAL_EXTENSION: &str = "mat";

/// Name of the sample matrix inside the payload.
pub const SIGNAL_VARIABLE: &str = "val";

/// Leads of a standard 12-lead ECG, in storage order.
pub const LEAD_NAMES: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

pub const LEAD_COUNT: usize = LEAD_NAMES.len();

// ---------------------------------------------------------------------------
// SignalArray – [12 × samples] in raw device units
// ---------------------------------------------------------------------------

/// Decoded samples of one record, one row per lead, raw device units.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalArray {
    samples: Array2<f64>,
}

impl SignalArray {
    /// Wrap a matrix; it must have exactly [`LEAD_COUNT`] rows.
    pub fn new(record: &RecordId, samples: Array2<f64>) -> Result<Self, DecodeError> {
        if samples.nrows() != LEAD_COUNT {
            return Err(DecodeError::ChannelCount {
                record: record.clone(),
                found: samples.nrows(),
                expected: LEAD_COUNT,
            });
        }
        Ok(SignalArray { samples })
    }

    /// Read and decode `<record>.mat`.
    pub fn load(record: &RecordId) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(record.signal_path()).map_err(|source| DecodeError::Io {
            record: record.clone(),
            source,
        })?;
        let samples = matfile::read_matrix(&bytes, SIGNAL_VARIABLE)
            .map_err(|e| decode_error(record, e))?;
        log::debug!("decoded signal {record}: {:?}", samples.dim());
        Self::new(record, samples)
    }

    pub fn channel_count(&self) -> usize {
        self.samples.nrows()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn into_array(self) -> Array2<f64> {
        self.samples
    }

    /// One lead by name (`"II"`, `"V5"`, ...).
    pub fn lead(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        LEAD_NAMES
            .iter()
            .position(|lead| *lead == name)
            .map(|i| self.samples.row(i))
    }

    /// A copy divided by `gain` (raw units per physical unit).
    pub fn scaled(&self, gain: f64) -> Array2<f64> {
        &self.samples / gain
    }
}

fn decode_error(record: &RecordId, err: MatError) -> DecodeError {
    let record = record.clone();
    match err {
        MatError::Truncated(detail) => DecodeError::Truncated { record, detail },
        MatError::Malformed(detail) => DecodeError::Malformed { record, detail },
        MatError::Unsupported(detail) => DecodeError::Unsupported { record, detail },
        MatError::MissingVariable(name) => DecodeError::MissingVariable { record, name },
    }
}
