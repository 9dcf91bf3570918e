use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Upload extensions accepted by the ingestor (compared lowercased)
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

/// Default request body cap: 200 MiB
pub const MAX_CONTENT_LENGTH: usize = 200 * 1024 * 1024;

/// Prefix for environment overrides, e.g. `EDA_SECRET_KEY`
pub const ENV_PREFIX: &str = "EDA_";

const DEFAULT_SECRET_KEY: &str = "dev-secret-key";

/// Process-wide settings, built once at startup and never mutated
///
/// Every field can be overridden through an `EDA_`-prefixed environment
/// variable (`EDA_SECRET_KEY`, `EDA_BIND_ADDR`, `EDA_UPLOAD_DIR`,
/// `EDA_REPORT_DIR`, `EDA_MAX_UPLOAD_BYTES`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Secret used to sign the flash-message cookie
    pub secret_key: String,

    /// Socket address the web server listens on
    pub bind_addr: String,

    /// Directory holding stored datasets
    pub upload_dir: PathBuf,

    /// Directory holding generated reports
    pub report_dir: PathBuf,

    /// Maximum accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            report_dir: PathBuf::from("reports"),
            max_upload_bytes: MAX_CONTENT_LENGTH,
        }
    }
}

impl Config {
    /// Build the configuration from defaults merged with the environment
    pub fn load() -> Result<Self> {
        Self::figment().extract().map_err(Into::into)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    /// Default settings with both storage directories placed under `root`
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            upload_dir: root.join("uploads"),
            report_dir: root.join("reports"),
            ..Self::default()
        }
    }

    /// Whether the secret is still the development default
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Create the upload and report directories if they are absent
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        create_dir_all(&self.upload_dir)?;
        create_dir_all(&self.report_dir)?;
        Ok(())
    }
}
