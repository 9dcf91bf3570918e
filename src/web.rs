#![cfg(not(tarpaulin_include))]

use eda_report::{Config, app};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main entry point for the web application
///
/// Loads `.env` when present, initialises logging from `RUST_LOG` (default
/// `info`), builds the configuration from `EDA_` environment variables and
/// serves the application.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    if config.uses_default_secret() {
        warn!("EDA_SECRET_KEY is not set; flash cookies are signed with the development key");
    }
    info!(
        upload_dir = %config.upload_dir.display(),
        report_dir = %config.report_dir.display(),
        "starting eda-web"
    );

    app::run(config).await
}
