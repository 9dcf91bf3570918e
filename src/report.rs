use tracing::info;

use crate::error::Result;
use crate::ingest::{load_dataset, report_filename};
use crate::profile::{ProfileConfig, REPORT_TITLE, profile_frame};
use crate::render::Templates;
use crate::storage::Storage;

/// Profile a stored dataset and persist the rendered report
///
/// The report name is derived from the dataset name only, so generating
/// twice for the same dataset overwrites the earlier report in place.
///
/// # Arguments
/// * `storage` - Where the dataset is read from and the report written to
/// * `templates` - Registry holding the report template
/// * `stored_filename` - Name returned by `ingest::store_upload`
///
/// # Returns
/// * The report filename, `report_<stem>.html`
pub fn generate_report(
    storage: &dyn Storage,
    templates: &Templates,
    stored_filename: &str,
) -> Result<String> {
    let frame = load_dataset(storage, stored_filename)?;
    let profile = profile_frame(&frame, &ProfileConfig::explorative(REPORT_TITLE))?;
    let html = templates.render_report(&profile)?;

    let name = report_filename(stored_filename);
    storage.save_report(&name, &html)?;

    info!(
        dataset = %stored_filename,
        report = %name,
        variables = profile.overview.n_variables,
        alerts = profile.alerts.len(),
        "generated report"
    );
    Ok(name)
}
