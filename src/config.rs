use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::corpus::LengthRange;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "ECG_CORPUS_CONFIG";

// ---------------------------------------------------------------------------
// Run configuration for the driver binaries
// ---------------------------------------------------------------------------

/// Where the corpus lives and how to interpret it. Every field is optional in
/// the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding one directory per source dataset.
    pub data_dir: PathBuf,
    pub snomed_dir: PathBuf,
    /// File name of the relevant code catalog inside `snomed_dir`.
    pub relevant_csv: String,
    /// Samples per second per lead.
    pub sample_rate: u32,
    /// Raw device units per millivolt.
    pub gain: f64,
    /// Inclusive `[min, max]` declared sample count; `null` keeps every record.
    pub length_range: Option<(usize, usize)>,
    /// Catalog description of the finding the driver looks for.
    pub target_finding: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/samples"),
            snomed_dir: PathBuf::from("./data/snomed_mappings"),
            relevant_csv: "relevant_SNOMED_mappings.csv".to_string(),
            sample_rate: 500,
            gain: 1000.0,
            length_range: Some((5000, 5000)),
            target_finding: "myocardial ischemia".to_string(),
        }
    }
}

impl Config {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `path` if given, else `$ECG_CORPUS_CONFIG` if set, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(env_path) => Self::from_file(Path::new(&env_path)),
            None => Ok(Self::default()),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.snomed_dir.join(&self.relevant_csv)
    }

    pub fn length_range(&self) -> Option<LengthRange> {
        self.length_range
            .map(|(min, max)| LengthRange::between(min, max))
    }
}
