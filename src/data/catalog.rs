use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, LookupError};

/// A SNOMED CT diagnostic code as written in the `Dx:` header line.
pub type DxCode = u64;

/// Findings related to myocardial ischemia and infarction.
pub const RELEVANT_FINDINGS: [(DxCode, &str); 11] = [
    (54329005, "anterior myocardial infarction"),
    (57054005, "acute myocardial infarction"),
    (164861001, "myocardial ischemia"),
    (164865005, "myocardial infarction"),
    (164931005, "st elevation"),
    (413444003, "acute myocardial ischemia"),
    (425419005, "inferior ischaemia"),
    (425623009, "lateral ischaemia"),
    (426434006, "anterior ischemia"),
    (59931005, "t wave inversion"),
    (251259000, "high t-voltage"),
];

// ---------------------------------------------------------------------------
// CSV row of the backing artifact
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct CatalogRow {
    code: DxCode,
    #[serde(rename = "desc", alias = "description")]
    description: String,
}

// ---------------------------------------------------------------------------
// CodeCatalog
// ---------------------------------------------------------------------------

/// Immutable code ↔ description mapping. Build once, then share by reference.
#[derive(Debug, Clone, Default)]
pub struct CodeCatalog {
    by_code: BTreeMap<DxCode, String>,
    by_description: BTreeMap<String, BTreeSet<DxCode>>,
}

impl CodeCatalog {
    /// Build from `(code, description)` pairs. A repeated code keeps its last
    /// description. Duplicate descriptions are logged and left in place; looking
    /// them up with [`CodeCatalog::code_for`] fails.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (DxCode, S)>,
        S: Into<String>,
    {
        let mut by_code = BTreeMap::new();
        for (code, description) in entries {
            if let Some(previous) = by_code.insert(code, description.into()) {
                log::warn!("diagnostic code {code} listed twice, dropping '{previous}'");
            }
        }

        let mut by_description: BTreeMap<String, BTreeSet<DxCode>> = BTreeMap::new();
        for (code, description) in &by_code {
            by_description
                .entry(description.clone())
                .or_default()
                .insert(*code);
        }
        for (description, codes) in &by_description {
            if codes.len() > 1 {
                log::warn!("description '{description}' is shared by codes {codes:?}");
            }
        }

        CodeCatalog {
            by_code,
            by_description,
        }
    }

    /// The built-in table of relevant findings.
    pub fn relevant() -> Self {
        Self::from_entries(RELEVANT_FINDINGS)
    }

    /// Read a `code,desc` CSV.
    pub fn from_csv(path: &Path) -> Result<Self, CatalogError> {
        let csv_err = |source| CatalogError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let rows = reader
            .deserialize::<CatalogRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        log::debug!("read {} catalog rows from {}", rows.len(), path.display());
        Ok(Self::from_entries(
            rows.into_iter().map(|row| (row.code, row.description)),
        ))
    }

    /// Write the catalog as a `code,desc` CSV, sorted by code.
    pub fn write_csv(&self, path: &Path) -> Result<(), CatalogError> {
        let csv_err = |source| CatalogError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for (code, description) in &self.by_code {
            writer
                .serialize(CatalogRow {
                    code: *code,
                    description: description.clone(),
                })
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the built-in relevant table to `path` unless the file exists.
    /// Returns whether anything was written.
    pub fn ensure_csv(path: &Path) -> Result<bool, CatalogError> {
        if path.exists() {
            log::info!("relevant code catalog already present at {}", path.display());
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::relevant().write_csv(path)?;
        log::info!("relevant code catalog created at {}", path.display());
        Ok(true)
    }

    /// Description of `code`.
    pub fn describe(&self, code: DxCode) -> Result<&str, LookupError> {
        self.by_code
            .get(&code)
            .map(String::as_str)
            .ok_or(LookupError::UnknownCode(code))
    }

    /// The single code described exactly as `description`.
    pub fn code_for(&self, description: &str) -> Result<DxCode, LookupError> {
        let codes = self
            .by_description
            .get(description)
            .ok_or_else(|| LookupError::UnknownDescription(description.to_string()))?;
        let mut iter = codes.iter();
        match (iter.next(), iter.next()) {
            (Some(code), None) => Ok(*code),
            _ => Err(LookupError::AmbiguousDescription {
                description: description.to_string(),
                codes: codes.iter().copied().collect(),
            }),
        }
    }

    /// Every code in the catalog; the predicate for label filtering.
    pub fn relevant_codes(&self) -> BTreeSet<DxCode> {
        self.by_code.keys().copied().collect()
    }

    pub fn contains(&self, code: DxCode) -> bool {
        self.by_code.contains_key(&code)
    }

    /// `(code, description)` in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (DxCode, &str)> {
        self.by_code.iter().map(|(c, d)| (*c, d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
