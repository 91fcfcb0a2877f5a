use std::fs::File;
use std::path::Path;

use ndarray::Array2;
use proptest::prelude::*;
use tempfile::TempDir;

use ecg_corpus::data::matfile::{write_level4, Precision};
use ecg_corpus::{
    enumerate, enumerate_corpus, filter_by_length, header_labels, load_header, load_record,
    load_signal, partition_counts, CodeCatalog, CorpusError, DecodeError, FormatError,
    HeaderRecord, LengthRange, RecordId, SignalArray,
};

fn header_text(stem: &str, samples: usize, dx: &str) -> String {
    let mut text = format!("{stem} 12 500 {samples} 05-Feb-2020 11:39:16\n");
    for lead in ["I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6"] {
        text.push_str(&format!("{stem}.mat 16+24 1000/mV 16 0 0 0 0 {lead}\n"));
    }
    text.push_str(&format!("#Age: 61\n#Sex: Female\n#Dx: {dx}\n#Rx: Unknown\n"));
    text
}

/// Write `<dir>/<stem>.hea` and `<dir>/<stem>.mat` with `samples` per lead.
fn write_record(dir: &Path, stem: &str, samples: usize, dx: &str) -> RecordId {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{stem}.hea")), header_text(stem, samples, dx)).unwrap();
    let leads = Array2::from_shape_fn((12, samples), |(lead, t)| (lead as f64) * 100.0 + t as f64);
    let mut file = File::create(dir.join(format!("{stem}.mat"))).unwrap();
    write_level4(&mut file, "val", &leads, Precision::Int16).unwrap();
    RecordId::from_path(&dir.join(stem))
}

fn corpus() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let cpsc = root.path().join("cpsc_2018");
    let georgia = root.path().join("georgia");
    write_record(&cpsc, "A0002", 5000, "164861001");
    write_record(&cpsc, "A0001", 7500, "164865005,426434006,426434006");
    write_record(&georgia, "E0001", 5000, "426783006");
    write_record(&georgia, "E0002", 2500, "59931005,164861001");
    std::fs::write(georgia.join(".DS_Store"), b"").unwrap();
    std::fs::write(root.path().join("README.txt"), b"not a partition").unwrap();
    root
}

fn stems(records: &[RecordId]) -> Vec<&str> {
    records.iter().map(RecordId::stem).collect()
}

#[test]
fn test_enumerate_orders_partitions_and_stems() {
    let root = corpus();
    let records = enumerate(root.path()).unwrap();
    assert_eq!(stems(&records), vec!["A0001", "A0002", "E0001", "E0002"]);
    assert_eq!(records[0].path(), root.path().join("cpsc_2018").join("A0001"));

    assert_eq!(
        partition_counts(root.path()).unwrap(),
        vec![("cpsc_2018".to_string(), 2), ("georgia".to_string(), 2)]
    );
}

#[test]
fn test_filter_by_length_inclusive() {
    let root = corpus();
    let all = enumerate(root.path()).unwrap();

    let exact = filter_by_length(all.clone(), LengthRange::exact(5000)).unwrap();
    assert_eq!(stems(&exact), vec!["A0002", "E0001"]);

    let range = filter_by_length(all.clone(), LengthRange::between(2500, 5000)).unwrap();
    assert_eq!(stems(&range), vec!["A0002", "E0001", "E0002"]);

    let none = filter_by_length(all, LengthRange::between(8000, 9000)).unwrap();
    assert!(none.is_empty());

    let unfiltered = enumerate_corpus(root.path(), None).unwrap();
    assert_eq!(unfiltered.len(), 4);
}

#[test]
fn test_filter_never_touches_signals() {
    let root = corpus();
    // corrupt every payload; a header-only pass must not notice
    for record in enumerate(root.path()).unwrap() {
        std::fs::write(record.signal_path(), b"garbage").unwrap();
    }
    let kept = enumerate_corpus(root.path(), Some(LengthRange::exact(7500))).unwrap();
    assert_eq!(stems(&kept), vec!["A0001"]);
    assert!(matches!(
        load_signal(kept[0].path()),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn test_malformed_header_aborts_filtering() {
    let root = corpus();
    let bad = root.path().join("georgia").join("E0003.hea");
    let truncated: Vec<String> = header_text("E0003", 5000, "1")
        .lines()
        .take(15)
        .map(str::to_string)
        .collect();
    std::fs::write(&bad, truncated.join("\n")).unwrap();

    let header = load_header(&bad).unwrap();
    assert!(matches!(
        header.diagnostic_codes(),
        Err(FormatError::MissingLine { line: 15, .. })
    ));

    match enumerate_corpus(root.path(), Some(LengthRange::between(0, 10_000))) {
        Err(CorpusError::Header(err)) => assert_eq!(err.record().stem(), "E0003"),
        other => panic!("expected header failure, got {other:?}"),
    }
}

#[test]
fn test_missing_header_aborts_filtering() {
    let root = corpus();
    // a payload with no header beside it
    std::fs::write(root.path().join("georgia").join("E0009.mat"), b"").unwrap();
    let err = enumerate_corpus(root.path(), Some(LengthRange::exact(5000))).unwrap_err();
    assert!(matches!(err, CorpusError::Header(FormatError::Io { .. })));
}

#[test]
fn test_labels_then_lazy_signal() {
    let root = corpus();
    let catalog = CodeCatalog::relevant();
    let relevant = catalog.relevant_codes();
    let ischemia = catalog.code_for("myocardial ischemia").unwrap();

    let mut matches = Vec::new();
    for record in enumerate(root.path()).unwrap() {
        let header = load_header(record.path()).unwrap();
        let labels = header_labels(&header, &relevant).unwrap();
        if labels == [ischemia] {
            matches.push(record);
        }
    }
    assert_eq!(stems(&matches), vec!["A0002"]);

    let signal = load_signal(matches[0].path()).unwrap();
    assert_eq!(signal.as_array().dim(), (12, 5000));

    let a0001 = load_header(&root.path().join("cpsc_2018").join("A0001")).unwrap();
    assert_eq!(
        header_labels(&a0001, &relevant).unwrap(),
        vec![164865005, 426434006]
    );
    let names: Vec<&str> = header_labels(&a0001, &relevant)
        .unwrap()
        .into_iter()
        .map(|code| catalog.describe(code).unwrap())
        .collect();
    assert_eq!(names, vec!["myocardial infarction", "anterior ischemia"]);
}

#[test]
fn test_load_record_tolerates_length_mismatch() {
    let root = corpus();
    let dir = root.path().join("cpsc_2018");
    let record = write_record(&dir, "A0003", 100, "164861001");
    std::fs::write(record.header_path(), header_text("A0003", 5000, "164861001")).unwrap();

    let loaded = load_record(record.path()).unwrap();
    assert_eq!(loaded.signal.sample_count(), 100);
    assert_eq!(loaded.header.sample_length().unwrap(), 5000);
    assert_eq!(loaded.length_mismatch(), Some((Some(5000), 100)));
}

#[test]
fn test_dotted_stems_resolve_to_their_own_files() {
    let root = tempfile::tempdir().unwrap();
    let ptb = root.path().join("ptb_xl");
    write_record(&ptb, "HR.00001", 5000, "164861001");
    write_record(&ptb, "HR.00002", 2500, "426783006");
    assert_eq!(
        stems(&enumerate(root.path()).unwrap()),
        vec!["HR.00001", "HR.00002"]
    );

    let records = enumerate_corpus(root.path(), Some(LengthRange::exact(5000))).unwrap();
    assert_eq!(stems(&records), vec!["HR.00001"]);

    let header = HeaderRecord::load(&records[0]).unwrap();
    assert_eq!(header.record(), &records[0]);
    assert_eq!(header.sample_length().unwrap(), 5000);
    let signal = SignalArray::load(&records[0]).unwrap();
    assert_eq!(signal.sample_count(), 5000);

    let by_path = load_header(&ptb.join("HR.00002.hea")).unwrap();
    assert_eq!(by_path.record().stem(), "HR.00002");
    assert_eq!(load_signal(&ptb.join("HR.00002")).unwrap().sample_count(), 2500);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_length_filter_is_monotone(
        lengths in prop::collection::vec(1usize..40, 1..8),
        a in 0usize..40,
        width in 0usize..20,
        widen_low in 0usize..10,
        widen_high in 0usize..10,
    ) {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("part");
        for (i, len) in lengths.iter().enumerate() {
            write_record(&dir, &format!("R{i:03}"), *len, "164861001");
        }
        let all = enumerate(root.path()).unwrap();

        let inner = LengthRange::between(a, a + width);
        let outer = LengthRange::between(a.saturating_sub(widen_low), a + width + widen_high);
        let narrow = filter_by_length(all.clone(), inner).unwrap();
        let wide = filter_by_length(all, outer).unwrap();

        prop_assert!(narrow.iter().all(|r| wide.contains(r)));
        let expected = lengths.iter().filter(|l| inner.contains(**l)).count();
        prop_assert_eq!(narrow.len(), expected);
    }
}
