use lazy_static::lazy_static;
use polars::prelude::DataFrame;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EdaError, Result};
use crate::loader::{allowed_file, extension_of, load_frame};
use crate::storage::Storage;

pub const DATASET_PREFIX: &str = "dataset_";
pub const REPORT_PREFIX: &str = "report_";
pub const REPORT_SUFFIX: &str = ".html";

lazy_static! {
    static ref STORED_FILENAME_REGEX: Regex =
        Regex::new(r"^dataset_[0-9a-f]{32}\.(csv|xlsx|xls)$").unwrap();
    static ref REPORT_FILENAME_REGEX: Regex =
        Regex::new(r"^report_dataset_[0-9a-f]{32}\.html$").unwrap();
}

/// An uploaded file as persisted by the ingestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDataset {
    /// Random 32-character hex identifier
    pub token: String,

    /// Lowercased original extension
    pub extension: String,

    /// `dataset_<token>.<extension>`
    pub stored_filename: String,
}

impl StoredDataset {
    fn new(extension: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let stored_filename = format!("{}{}.{}", DATASET_PREFIX, token, extension);
        Self {
            token,
            extension: extension.to_string(),
            stored_filename,
        }
    }
}

/// Validate the extension of an upload and persist it under a fresh name
///
/// Nothing is written when the extension is not allowed.
pub fn store_upload(
    storage: &dyn Storage,
    original_filename: &str,
    bytes: &[u8],
) -> Result<StoredDataset> {
    if !allowed_file(original_filename) {
        return Err(match extension_of(original_filename) {
            Some(ext) => EdaError::UnsupportedFileType(ext),
            None => EdaError::MissingExtension,
        });
    }

    let extension = extension_of(original_filename).ok_or(EdaError::MissingExtension)?;
    let dataset = StoredDataset::new(&extension);
    storage.save_dataset(&dataset.stored_filename, bytes)?;

    info!(
        stored = %dataset.stored_filename,
        original = %original_filename,
        bytes = bytes.len(),
        "stored upload"
    );
    Ok(dataset)
}

/// Whether `name` looks like something `store_upload` produced
pub fn is_valid_stored_filename(name: &str) -> bool {
    STORED_FILENAME_REGEX.is_match(name)
}

/// Whether `name` looks like something `report_filename` produced for a
/// stored dataset
pub fn is_valid_report_filename(name: &str) -> bool {
    REPORT_FILENAME_REGEX.is_match(name)
}

/// Re-read and parse a stored dataset
pub fn load_dataset(storage: &dyn Storage, stored_filename: &str) -> Result<DataFrame> {
    if !is_valid_stored_filename(stored_filename) {
        return Err(EdaError::DatasetNotFound(stored_filename.to_string()));
    }

    let bytes = storage.read_dataset(stored_filename)?;
    let frame = load_frame(stored_filename, &bytes)?;
    debug!(
        stored = %stored_filename,
        rows = frame.height(),
        cols = frame.width(),
        "parsed dataset"
    );
    Ok(frame)
}

/// `report_<stem>.html` for a stored dataset filename
///
/// # Examples
/// ```
/// use eda_report::ingest::report_filename;
///
/// assert_eq!(report_filename("dataset_abc.csv"), "report_dataset_abc.html");
/// ```
pub fn report_filename(stored_filename: &str) -> String {
    let stem = Path::new(stored_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stored_filename);
    format!("{}{}{}", REPORT_PREFIX, stem, REPORT_SUFFIX)
}
