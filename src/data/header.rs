use std::collections::BTreeSet;
use std::fmt;

use crate::data::catalog::DxCode;
use crate::data::corpus::RecordId;
use crate::data::filter::filtered_labels;
use crate::error::FormatError;

// ---------------------------------------------------------------------------
// Fixed layout of a PhysioNet/CinC 2020 WFDB header (.hea)
// ---------------------------------------------------------------------------

/// Extension of the textual header file of a record.
pub const HEADER_EXTENSION: &str = "hea";

/// Record line: `<name> <leads> <rate> <samples> ...`.
pub const RECORD_LINE: usize = 0;
/// Position of the per-lead sample count on the record line.
pub const SAMPLE_COUNT_TOKEN: usize = 3;

/// Line of the `Age:` comment (after the record line and 12 signal lines).
pub const AGE_LINE: usize = 13;
/// Line of the `Sex:` comment.
pub const SEX_LINE: usize = 14;
/// Line of the `Dx:` comment.
pub const DX_LINE: usize = 15;

/// Optional WFDB comment marker in front of the metadata labels.
pub const COMMENT_MARKER: char = '#';
pub const AGE_LABEL: &str = "Age: ";
pub const SEX_LABEL: &str = "Sex: ";
pub const DX_LABEL: &str = "Dx: ";

// ---------------------------------------------------------------------------
// HeaderRecord – raw lines plus typed views
// ---------------------------------------------------------------------------

/// The full text of one header file, with typed accessors over the fixed
/// metadata lines. All other lines are retained untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    record: RecordId,
    lines: Vec<String>,
}

impl HeaderRecord {
    /// Wrap already-split header lines.
    pub fn from_lines(record: RecordId, lines: Vec<String>) -> Self {
        HeaderRecord { record, lines }
    }

    /// Split header text into lines, trimming surrounding whitespace on each.
    pub fn parse(record: RecordId, text: &str) -> Self {
        let lines = text.lines().map(|l| l.trim().to_string()).collect();
        Self::from_lines(record, lines)
    }

    /// Read `<record>.hea`.
    pub fn load(record: &RecordId) -> Result<Self, FormatError> {
        let record = record.clone();
        let text = std::fs::read_to_string(record.header_path()).map_err(|source| {
            FormatError::Io {
                record: record.clone(),
                source,
            }
        })?;
        log::debug!("loaded header {record}");
        Ok(Self::parse(record, &text))
    }

    pub fn record(&self) -> &RecordId {
        &self.record
    }

    /// Every line of the header, in file order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Per-lead sample count declared on the record line.
    ///
    /// Not checked against the decoded signal.
    pub fn sample_length(&self) -> Result<usize, FormatError> {
        let line = self.line(RECORD_LINE, "record line")?;
        let tokens: Vec<&str> = line.split(' ').collect();
        let token = tokens
            .get(SAMPLE_COUNT_TOKEN)
            .ok_or_else(|| FormatError::MissingToken {
                record: self.record.clone(),
                line: RECORD_LINE,
                found: tokens.len(),
                expected: SAMPLE_COUNT_TOKEN + 1,
            })?;
        self.parse_int(token, RECORD_LINE, "sample count")
    }

    pub fn age(&self) -> Result<u32, FormatError> {
        let value = self.labelled_value(AGE_LINE, AGE_LABEL, "age")?;
        self.parse_int(value, AGE_LINE, "age")
    }

    /// Sex as written by the recording device; not validated.
    pub fn gender(&self) -> Result<&str, FormatError> {
        self.labelled_value(SEX_LINE, SEX_LABEL, "sex")
    }

    /// Diagnostic codes in file order, duplicates included.
    pub fn diagnostic_codes(&self) -> Result<Vec<DxCode>, FormatError> {
        let value = self.labelled_value(DX_LINE, DX_LABEL, "diagnostic codes")?;
        value
            .split(',')
            .map(|tok| self.parse_int(tok.trim(), DX_LINE, "diagnostic code"))
            .collect()
    }

    /// Diagnostic codes that are also in `relevant`, deduplicated and sorted.
    pub fn filtered_codes<'a, R>(&self, relevant: R) -> Result<Vec<DxCode>, FormatError>
    where
        R: IntoIterator<Item = &'a DxCode>,
    {
        let relevant: BTreeSet<DxCode> = relevant.into_iter().copied().collect();
        Ok(filtered_labels(&self.diagnostic_codes()?, &relevant))
    }

    // -- helpers --

    fn line(&self, index: usize, field: &'static str) -> Result<&str, FormatError> {
        self.lines
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| FormatError::MissingLine {
                record: self.record.clone(),
                line: index,
                field,
                found: self.lines.len(),
            })
    }

    /// Strip the fixed-width label (and optional comment marker) from a line.
    fn labelled_value(
        &self,
        index: usize,
        label: &'static str,
        field: &'static str,
    ) -> Result<&str, FormatError> {
        let line = self.line(index, field)?;
        let unmarked = line.strip_prefix(COMMENT_MARKER).unwrap_or(line);
        match unmarked.get(..label.len()) {
            Some(prefix) if prefix.trim_end() == label.trim_end() => {
                Ok(unmarked[label.len()..].trim())
            }
            _ if unmarked.trim_end() == label.trim_end() => Ok(""),
            _ => Err(FormatError::UnexpectedLabel {
                record: self.record.clone(),
                line: index,
                expected: label,
                text: line.to_string(),
            }),
        }
    }

    fn parse_int<T: std::str::FromStr>(
        &self,
        value: &str,
        line: usize,
        field: &'static str,
    ) -> Result<T, FormatError> {
        value.parse::<T>().map_err(|_| FormatError::NotAnInteger {
            record: self.record.clone(),
            line,
            field,
            value: value.to_string(),
        })
    }
}

impl fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    /// A header shaped like the CinC 2020 files: record line, 12 signal
    /// lines, then the metadata comments.
    fn sample_header(record_line: &str, age: &str, sex: &str, dx: &str) -> String {
        let mut text = format!("{record_line}\n");
        for lead in ["I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6"] {
            text.push_str(&format!(
                "A0001.mat 16+24 1000/mV 16 0 28 -1716 0 {lead}\n"
            ));
        }
        text.push_str(&format!("{age}\n{sex}\n{dx}\n#Rx: Unknown\n#Hx: Unknown\n"));
        text
    }

    fn header(text: &str) -> HeaderRecord {
        HeaderRecord::parse(RecordId::from_path(Path::new("data/cpsc/A0001")), text)
    }

    #[test]
    fn test_plain_labels() {
        let h = header(&sample_header(
            "A0001 12 500 5000",
            "Age: 57",
            "Sex: Male",
            "Dx: 164865005,426434006,426434006",
        ));
        assert_eq!(h.sample_length().unwrap(), 5000);
        assert_eq!(h.age().unwrap(), 57);
        assert_eq!(h.gender().unwrap(), "Male");
        assert_eq!(
            h.diagnostic_codes().unwrap(),
            vec![164865005, 426434006, 426434006]
        );
        let relevant = [164865005, 426434006, 59931005];
        assert_eq!(
            h.filtered_codes(&relevant).unwrap(),
            vec![164865005, 426434006]
        );
    }

    #[test]
    fn test_comment_marked_labels() {
        let h = header(&sample_header(
            "A0002 12 500 7500 05-Feb-2020 11:39:16",
            "#Age: 74",
            "#Sex: Female",
            "#Dx: 59118001",
        ));
        assert_eq!(h.sample_length().unwrap(), 7500);
        assert_eq!(h.age().unwrap(), 74);
        assert_eq!(h.gender().unwrap(), "Female");
        assert_eq!(h.diagnostic_codes().unwrap(), vec![59118001]);
    }

    #[test]
    fn test_gender_is_opaque() {
        let h = header(&sample_header("A 12 500 10", "#Age: 1", "#Sex: Unknown", "#Dx: 1"));
        assert_eq!(h.gender().unwrap(), "Unknown");
    }

    #[test]
    fn test_short_record_line() {
        let h = header(&sample_header("A0001 12 500", "#Age: 57", "#Sex: Male", "#Dx: 1"));
        let err = h.sample_length().unwrap_err();
        assert!(matches!(
            err,
            FormatError::MissingToken { found: 3, expected: 4, .. }
        ));
        assert_eq!(err.record().stem(), "A0001");
    }

    #[test]
    fn test_non_numeric_fields() {
        let h = header(&sample_header("A0001 12 500 lots", "#Age: NaN", "#Sex: M", "#Dx: 1,x"));
        assert!(matches!(h.sample_length(), Err(FormatError::NotAnInteger { line: 0, .. })));
        assert!(matches!(h.age(), Err(FormatError::NotAnInteger { line: 13, .. })));
        assert!(matches!(
            h.diagnostic_codes(),
            Err(FormatError::NotAnInteger { line: 15, .. })
        ));
    }

    #[test]
    fn test_missing_dx_line() {
        let full = sample_header("A0001 12 500 5000", "#Age: 57", "#Sex: Male", "#Dx: 1");
        let truncated: Vec<&str> = full.lines().take(DX_LINE).collect();
        let h = header(&truncated.join("\n"));
        assert_eq!(h.gender().unwrap(), "Male");
        assert!(matches!(
            h.diagnostic_codes(),
            Err(FormatError::MissingLine { line: 15, found: 15, .. })
        ));
    }

    #[test]
    fn test_missing_age_and_sex_lines() {
        let full = sample_header("A0001 12 500 5000", "#Age: 57", "#Sex: Male", "#Dx: 1");

        let to_age: Vec<&str> = full.lines().take(AGE_LINE).collect();
        let h = header(&to_age.join("\n"));
        assert_eq!(h.sample_length().unwrap(), 5000);
        assert!(matches!(
            h.age(),
            Err(FormatError::MissingLine { line: 13, found: 13, .. })
        ));
        assert!(matches!(h.gender(), Err(FormatError::MissingLine { line: 14, .. })));

        let to_sex: Vec<&str> = full.lines().take(SEX_LINE).collect();
        let h = header(&to_sex.join("\n"));
        assert_eq!(h.age().unwrap(), 57);
        assert!(matches!(
            h.gender(),
            Err(FormatError::MissingLine { line: 14, found: 14, .. })
        ));
    }

    #[test]
    fn test_from_lines_keeps_lines_verbatim() {
        let lines = vec![
            "A0001 12 500 5000".to_string(),
            "  padded  ".to_string(),
        ];
        let h = HeaderRecord::from_lines(
            RecordId::from_path(Path::new("A0001")),
            lines.clone(),
        );
        assert_eq!(h.lines(), lines.as_slice());
        assert_eq!(h.sample_length().unwrap(), 5000);
        assert!(matches!(h.age(), Err(FormatError::MissingLine { line: 13, .. })));
    }

    #[test]
    fn test_wrong_label_on_fixed_line() {
        let h = header(&sample_header("A0001 12 500 5000", "#Sex: Male", "#Age: 57", "#Dx: 1"));
        assert!(matches!(h.age(), Err(FormatError::UnexpectedLabel { line: 13, .. })));
    }

    #[test]
    fn test_display_round_trip() {
        let h = header(&sample_header(
            "A0001 12 500 5000",
            "#Age: 57",
            "#Sex: Male",
            "#Dx: 426434006,164865005",
        ));
        let again = HeaderRecord::parse(h.record().clone(), &h.to_string());
        assert_eq!(again, h);
        assert_eq!(again.sample_length().unwrap(), h.sample_length().unwrap());
        assert_eq!(again.age().unwrap(), h.age().unwrap());
        assert_eq!(again.gender().unwrap(), h.gender().unwrap());
        assert_eq!(again.diagnostic_codes().unwrap(), h.diagnostic_codes().unwrap());
    }
}
