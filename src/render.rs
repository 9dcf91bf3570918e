use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::profile::ProfileReport;

const INDEX_TEMPLATE: &str = "index";
const REPORT_TEMPLATE: &str = "report";

/// Data shown on the single application page
///
/// Every section is optional; the handlers fill in only what applies to the
/// request being answered.
#[derive(Debug, Default, Serialize)]
pub struct IndexPage {
    pub messages: Vec<String>,
    pub preview_html: Option<String>,
    pub file_token: Option<String>,
    pub stored_filename: Option<String>,
    pub report_url: Option<String>,
    pub max_upload_mb: usize,
}

/// Shorten a float for display: integers lose their fraction, everything
/// else keeps up to four decimals.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    if value.abs() >= 1e9 || value.abs() < 1e-4 {
        return format!("{:.4e}", value);
    }
    let text = format!("{:.4}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn json_number(value: &JsonValue) -> String {
    match value.as_f64() {
        Some(f) => format_number(f),
        None => "-".to_string(),
    }
}

handlebars_helper!(num: |v: Json| json_number(v));
handlebars_helper!(pct: |v: Json| match v.as_f64() {
    Some(f) => format!("{:.1}%", f),
    None => "-".to_string(),
});

/// Template registry for the index page and the EDA report
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_helper("num", Box::new(num));
        registry.register_helper("pct", Box::new(pct));
        registry.register_template_string(INDEX_TEMPLATE, include_str!("./templates/index.hbs"))?;
        registry
            .register_template_string(REPORT_TEMPLATE, include_str!("./templates/report.hbs"))?;
        Ok(Self { registry })
    }

    pub fn render_index(&self, page: &IndexPage) -> Result<String> {
        Ok(self.registry.render(INDEX_TEMPLATE, page)?)
    }

    /// Render a profile as one self-contained HTML document
    pub fn render_report(&self, report: &ProfileReport) -> Result<String> {
        Ok(self.registry.render(REPORT_TEMPLATE, report)?)
    }
}
