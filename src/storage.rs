use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::{EdaError, Result};

/// Persistence for uploaded datasets and generated reports
///
/// Names handed to a store are bare filenames produced by the ingestor;
/// stores never interpret them as paths.
pub trait Storage: Send + Sync {
    /// Persist the raw bytes of an uploaded dataset
    fn save_dataset(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Load a stored dataset, failing with `DatasetNotFound` when absent
    fn read_dataset(&self, name: &str) -> Result<Vec<u8>>;

    fn dataset_exists(&self, name: &str) -> bool;

    /// Persist a rendered report; readers never observe a partial write
    fn save_report(&self, name: &str, html: &str) -> Result<()>;

    /// Load a previously saved report
    fn read_report(&self, name: &str) -> Result<Option<String>>;
}

/// Filesystem-backed store rooted at the configured upload and report directories
#[derive(Debug, Clone)]
pub struct DiskStorage {
    upload_dir: PathBuf,
    report_dir: PathBuf,
}

impl DiskStorage {
    pub fn new(upload_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            report_dir: report_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.upload_dir, &config.report_dir)
    }
}

/// Write to a sibling temp file, then rename over the destination
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}

impl Storage for DiskStorage {
    fn save_dataset(&self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.upload_dir, name, bytes)
    }

    fn read_dataset(&self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.upload_dir.join(name)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EdaError::DatasetNotFound(name.to_string()),
            _ => EdaError::Io(e),
        })
    }

    fn dataset_exists(&self, name: &str) -> bool {
        self.upload_dir.join(name).is_file()
    }

    fn save_report(&self, name: &str, html: &str) -> Result<()> {
        write_atomic(&self.report_dir, name, html.as_bytes())
    }

    fn read_report(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.report_dir.join(name)) {
            Ok(html) => Ok(Some(html)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    datasets: RwLock<HashMap<String, Vec<u8>>>,
    reports: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn report_names(&self) -> Vec<String> {
        let reports = self.reports.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = reports.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Storage for MemoryStorage {
    fn save_dataset(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut datasets = self.datasets.write().unwrap_or_else(|e| e.into_inner());
        datasets.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_dataset(&self, name: &str) -> Result<Vec<u8>> {
        let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        datasets
            .get(name)
            .cloned()
            .ok_or_else(|| EdaError::DatasetNotFound(name.to_string()))
    }

    fn dataset_exists(&self, name: &str) -> bool {
        let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        datasets.contains_key(name)
    }

    fn save_report(&self, name: &str, html: &str) -> Result<()> {
        let mut reports = self.reports.write().unwrap_or_else(|e| e.into_inner());
        reports.insert(name.to_string(), html.to_string());
        Ok(())
    }

    fn read_report(&self, name: &str) -> Result<Option<String>> {
        let reports = self.reports.read().unwrap_or_else(|e| e.into_inner());
        Ok(reports.get(name).cloned())
    }
}
