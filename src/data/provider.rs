//! Data providers: flat `(VARIABLE, i1, ..., in) -> value` stores.
//!
//! [`RamDataProvider`] keeps everything in memory. [`CsvDataProvider`] is
//! backed by a whitespace-separated text file and only touches the disk on
//! load and [`DataProvider::sync`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{DataError, DataKey};

/// Storage for plain-keyed values.
pub trait DataProvider: Send {
    fn get(&self, key: &DataKey) -> Option<f64>;

    fn set(&mut self, key: DataKey, value: f64);

    /// Every stored entry, in key order.
    fn entries(&self) -> Vec<(DataKey, f64)>;

    /// Overwrite or insert every entry of `other`.
    fn copy_from(&mut self, other: &dyn DataProvider) {
        for (key, value) in other.entries() {
            self.set(key, value);
        }
    }

    /// Persist pending changes. In-memory providers have nothing to do.
    fn sync(&mut self) -> Result<(), DataError> {
        Ok(())
    }

    /// In-memory snapshot of the current contents.
    fn to_ram(&self) -> RamDataProvider {
        RamDataProvider::from_entries(self.entries())
    }
}

// ---------------------------------------------------------------------------
// RAM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RamDataProvider {
    entries: BTreeMap<DataKey, f64>,
}

impl RamDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (DataKey, f64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Build from `(variable, indices, value)` rows.
    pub fn from_rows(rows: &[(&str, &[usize], f64)]) -> Self {
        Self::from_entries(
            rows.iter()
                .map(|(variable, indices, value)| (DataKey::new(*variable, indices.to_vec()), *value)),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, key: &DataKey) -> Option<f64> {
        self.entries.remove(key)
    }

    /// Entries of one variable.
    pub fn variable_entries<'a>(
        &'a self,
        variable: &'a str,
    ) -> impl Iterator<Item = (&'a DataKey, f64)> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.variable == variable)
            .map(|(k, v)| (k, *v))
    }
}

impl DataProvider for RamDataProvider {
    fn get(&self, key: &DataKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: DataKey, value: f64) {
        self.entries.insert(key, value);
    }

    fn entries(&self) -> Vec<(DataKey, f64)> {
        self.entries.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    fn to_ram(&self) -> RamDataProvider {
        self.clone()
    }
}

// ---------------------------------------------------------------------------
// Text file
// ---------------------------------------------------------------------------

/// File-backed provider. Each line is `VARIABLE INDEX1 ... INDEXn VALUE`.
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    path: PathBuf,
    ram: RamDataProvider,
}

impl CsvDataProvider {
    /// Load an existing file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path)?;
        let ram = parse(&contents)?;
        info!(path = %path.display(), entries = ram.len(), "Data file loaded");
        Ok(Self { path, ram })
    }

    /// Load a file, or start empty when it does not exist yet.
    pub fn create_if_missing(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::open(path);
        }
        debug!(path = %path.display(), "Data file not found, starting empty");
        Ok(Self {
            path: path.to_path_buf(),
            ram: RamDataProvider::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ram(&self) -> &RamDataProvider {
        &self.ram
    }
}

impl DataProvider for CsvDataProvider {
    fn get(&self, key: &DataKey) -> Option<f64> {
        self.ram.get(key)
    }

    fn set(&mut self, key: DataKey, value: f64) {
        self.ram.set(key, value);
    }

    fn entries(&self) -> Vec<(DataKey, f64)> {
        self.ram.entries()
    }

    fn sync(&mut self) -> Result<(), DataError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, render(&self.ram))?;
        debug!(path = %self.path.display(), entries = self.ram.len(), "Data file synced");
        Ok(())
    }

    fn to_ram(&self) -> RamDataProvider {
        self.ram.clone()
    }
}

/// Parse whitespace-separated rows. Blank lines and `#` comments are skipped.
pub fn parse(contents: &str) -> Result<RamDataProvider, DataError> {
    let mut ram = RamDataProvider::new();

    for (number, line) in contents.lines().enumerate() {
        let line_no = number + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(DataError::MalformedRow {
                line: line_no,
                message: "expected a variable and a value".into(),
            });
        }

        let variable = fields[0];
        let value_field = fields[fields.len() - 1];
        let value: f64 = value_field.parse().map_err(|_| DataError::MalformedRow {
            line: line_no,
            message: format!("value `{value_field}` is not a number"),
        })?;

        let indices = fields[1..fields.len() - 1]
            .iter()
            .map(|field| {
                field.parse::<usize>().map_err(|_| DataError::MalformedRow {
                    line: line_no,
                    message: format!("index `{field}` is not an unsigned integer"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        ram.set(DataKey::new(variable, indices), value);
    }

    Ok(ram)
}

/// One line per entry, space-separated, in key order.
pub fn render(ram: &RamDataProvider) -> String {
    let mut out = String::new();
    for (key, value) in ram.entries() {
        out.push_str(&format!("{key} {value}\n"));
    }
    out
}

// ---------------------------------------------------------------------------
// Storage selection
// ---------------------------------------------------------------------------

/// Provider chosen by file extension.
#[derive(Debug, Clone)]
pub enum DataStore {
    Ram(RamDataProvider),
    Csv(CsvDataProvider),
}

impl DataStore {
    /// Open an existing data file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        check_extension(path)?;
        Ok(DataStore::Csv(CsvDataProvider::open(path)?))
    }

    /// Open a data file for writing, creating it on first sync.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        check_extension(path)?;
        Ok(DataStore::Csv(CsvDataProvider::create_if_missing(path)?))
    }
}

fn check_extension(path: &Path) -> Result<(), DataError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") | Some("txt") | Some("dat") => Ok(()),
        _ => Err(DataError::UnsupportedStorage(path.display().to_string())),
    }
}

impl DataProvider for DataStore {
    fn get(&self, key: &DataKey) -> Option<f64> {
        match self {
            DataStore::Ram(p) => p.get(key),
            DataStore::Csv(p) => p.get(key),
        }
    }

    fn set(&mut self, key: DataKey, value: f64) {
        match self {
            DataStore::Ram(p) => p.set(key, value),
            DataStore::Csv(p) => p.set(key, value),
        }
    }

    fn entries(&self) -> Vec<(DataKey, f64)> {
        match self {
            DataStore::Ram(p) => p.entries(),
            DataStore::Csv(p) => p.entries(),
        }
    }

    fn sync(&mut self) -> Result<(), DataError> {
        match self {
            DataStore::Ram(p) => p.sync(),
            DataStore::Csv(p) => p.sync(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
