use std::collections::{BTreeMap, BTreeSet};

use super::catalog::DxCode;
use super::corpus::RecordId;

// ---------------------------------------------------------------------------
// Label filter: record codes ∩ relevant codes
// ---------------------------------------------------------------------------

/// Codes from `codes` that are in `relevant`, deduplicated, ascending.
///
/// Two records carrying the same findings in a different order or with
/// repeats produce the same label set.
pub fn filtered_labels(codes: &[DxCode], relevant: &BTreeSet<DxCode>) -> Vec<DxCode> {
    codes
        .iter()
        .filter(|code| relevant.contains(*code))
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Label census: records grouped by their filtered label set
// ---------------------------------------------------------------------------

/// Records grouped by filtered label set. Records with no relevant label
/// are counted separately and not grouped.
#[derive(Debug, Clone, Default)]
pub struct LabelCensus {
    groups: BTreeMap<Vec<DxCode>, Vec<RecordId>>,
    unlabelled: usize,
}

impl LabelCensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under its (already filtered) labels.
    pub fn insert(&mut self, record: RecordId, labels: Vec<DxCode>) {
        if labels.is_empty() {
            self.unlabelled += 1;
            return;
        }
        self.groups.entry(labels).or_default().push(record);
    }

    /// Records whose label set is exactly `labels`.
    pub fn records(&self, labels: &[DxCode]) -> &[RecordId] {
        self.groups.get(labels).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(label set, record count)` ordered by label set.
    pub fn counts(&self) -> Vec<(&[DxCode], usize)> {
        self.groups
            .iter()
            .map(|(labels, records)| (labels.as_slice(), records.len()))
            .collect()
    }

    /// Records that carried at least one relevant label.
    pub fn labelled(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn unlabelled(&self) -> usize {
        self.unlabelled
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use proptest::prelude::*;

    use super::*;

    fn relevant() -> BTreeSet<DxCode> {
        [164865005, 426434006, 59931005].into_iter().collect()
    }

    #[test]
    fn test_intersection_sorted_and_deduplicated() {
        let codes = [426434006, 164865005, 426434006, 270492004];
        assert_eq!(
            filtered_labels(&codes, &relevant()),
            vec![164865005, 426434006]
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(filtered_labels(&[], &relevant()).is_empty());
        assert!(filtered_labels(&[164865005], &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_census_groups_equal_sets() {
        let rel = relevant();
        let mut census = LabelCensus::new();
        let a = RecordId::from_path(Path::new("cpsc/A0001"));
        let b = RecordId::from_path(Path::new("cpsc/A0002"));
        let c = RecordId::from_path(Path::new("ptb/S0001"));
        census.insert(a.clone(), filtered_labels(&[426434006, 164865005], &rel));
        census.insert(b.clone(), filtered_labels(&[164865005, 426434006, 164865005], &rel));
        census.insert(c, filtered_labels(&[1, 2], &rel));

        assert_eq!(census.records(&[164865005, 426434006]), &[a, b]);
        assert_eq!(census.counts(), vec![(&[164865005, 426434006][..], 2)]);
        assert_eq!(census.labelled(), 2);
        assert_eq!(census.unlabelled(), 1);
        assert!(census.records(&[59931005]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_order_independent(
            codes in prop::collection::vec(0u64..20, 0..40),
            relevant in prop::collection::btree_set(0u64..20, 0..10),
        ) {
            let mut reversed = codes.clone();
            reversed.reverse();
            let mut sorted = codes.clone();
            sorted.sort_unstable();
            let expected = filtered_labels(&codes, &relevant);
            prop_assert_eq!(filtered_labels(&reversed, &relevant), expected.clone());
            prop_assert_eq!(filtered_labels(&sorted, &relevant), expected);
        }

        #[test]
        fn prop_idempotent_and_normalised(
            codes in prop::collection::vec(0u64..20, 0..40),
            relevant in prop::collection::btree_set(0u64..20, 0..10),
        ) {
            let once = filtered_labels(&codes, &relevant);
            prop_assert_eq!(filtered_labels(&once, &relevant), once.clone());
            prop_assert!(once.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(once.iter().all(|c| relevant.contains(c) && codes.contains(c)));
        }
    }
}
