use thiserror::Error;

/// Errors raised while ingesting datasets and generating reports.
///
/// Handlers never let these escape as server errors; each one is turned into
/// a flash message by the web layer, so `Display` output is user facing.
#[derive(Debug, Error)]
pub enum EdaError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("file has no extension")]
    MissingExtension,

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("{0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("{0}")]
    Spreadsheet(String),

    #[error("no columns to parse from file")]
    EmptyDataset,

    #[error("template error: {0}")]
    Template(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<handlebars::RenderError> for EdaError {
    fn from(err: handlebars::RenderError) -> Self {
        EdaError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for EdaError {
    fn from(err: handlebars::TemplateError) -> Self {
        EdaError::Template(err.to_string())
    }
}

impl From<figment::Error> for EdaError {
    fn from(err: figment::Error) -> Self {
        EdaError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EdaError>;
