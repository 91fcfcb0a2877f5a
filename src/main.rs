use std::path::PathBuf;

use anyhow::{Context, Result};

use ecg_corpus::config::Config;
use ecg_corpus::{
    enumerate_corpus, partition_counts, CodeCatalog, HeaderRecord, LabelCensus, SignalArray,
    LEAD_NAMES,
};

// ---------------------------------------------------------------------------
// Corpus scan: label census + first record carrying only the target finding
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let catalog_path = config.catalog_path();
    CodeCatalog::ensure_csv(&catalog_path)?;
    let catalog = CodeCatalog::from_csv(&catalog_path)?;
    let relevant = catalog.relevant_codes();
    let target = catalog
        .code_for(&config.target_finding)
        .context("resolving target finding")?;

    for (partition, count) in partition_counts(&config.data_dir)? {
        log::info!("dataset {partition}: {count} records");
    }
    let records = enumerate_corpus(&config.data_dir, config.length_range())?;

    let mut census = LabelCensus::new();
    let mut found: Option<(HeaderRecord, SignalArray)> = None;
    for record in records {
        let header = HeaderRecord::load(&record)?;
        let labels = header.filtered_codes(&relevant)?;
        if found.is_none() && labels == [target] {
            let signal = SignalArray::load(&record)?;
            found = Some((header, signal));
        }
        census.insert(record, labels);
    }

    println!(
        "{} records with relevant findings, {} without",
        census.labelled(),
        census.unlabelled()
    );
    for (labels, count) in census.counts() {
        let names = labels
            .iter()
            .map(|code| catalog.describe(*code).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        println!("{count:>7}  {}", names.join(" + "));
    }

    match found {
        Some((header, signal)) => report(&config, &header, &signal)?,
        None => println!("no record carries only '{}'", config.target_finding),
    }
    Ok(())
}

/// Per-lead summary in millivolts.
fn report(
    config: &Config,
    header: &HeaderRecord,
    signal: &SignalArray,
) -> Result<()> {
    let record = header.record();
    let seconds = signal.sample_count() as f64 / config.sample_rate as f64;
    println!();
    println!(
        "{record}: {}, age {}, {seconds:.1} s at {} Hz",
        header.gender()?,
        header.age()?,
        config.sample_rate
    );

    let millivolts = signal.scaled(config.gain);
    for (name, lead) in LEAD_NAMES.iter().zip(millivolts.rows()) {
        let min = lead.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = lead.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = lead.mean().unwrap_or(0.0);
        println!("{name:>4}  min {min:>7.3} mV  max {max:>7.3} mV  mean {mean:>7.3} mV");
    }
    Ok(())
}
