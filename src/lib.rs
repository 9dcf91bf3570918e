/*!
# Automated EDA Report

A small web application that turns an uploaded CSV or Excel file into a
self-contained exploratory data analysis report, built in Rust.

## Overview

A user uploads a dataset from the browser, sees a preview of its first ten
rows, and asks for a report. The server profiles every column, renders the
result as a single HTML page with inline charts, stores it next to the other
reports and links to it.

## Architecture

### Web Layer
- **Technologies**: axum, tower-http, handlebars
- **Key Components**:
  - Upload page - Upload form, flash messages, preview and report link
  - Upload handler - Validates the extension, stores and parses the file
  - Generate handler - Profiles a stored dataset and writes the report
  - Report server - Serves stored reports by name

### Data Layer
- Datasets held as `polars` data frames with typed columns
- CSV parsing with the `polars` reader, Excel workbooks (first worksheet) with `calamine`
- Storage behind a trait, on disk with atomic writes or in memory for tests

### Profiling Layer
- Per-variable summaries: quantiles, moments, frequencies, date ranges
- Data-quality alerts: missing, constant, unique, skewed, correlated columns
- Pearson and Spearman correlation matrices
- Histograms and heatmaps rendered to inline SVG with `plotters`

## Modules

- **config**: Runtime settings loaded from defaults and `EDA_` environment variables
- **error**: Crate-wide error type
- **frame**: Cell display and column extraction for data frames
- **loader**: CSV and Excel parsing
- **storage**: Dataset and report persistence
- **ingest**: Upload validation, stored filenames, dataset reloading
- **preview**: HTML preview of the first rows
- **stats**: Descriptive statistics
- **graph**: SVG chart rendering
- **profile**: Profiling engine
- **render**: Page and report templates
- **report**: Report generation pipeline
- **app**: Routing and handlers (`web` feature)

## HTTP Endpoints

- `GET /` - Upload page
- `POST /upload` - Upload a dataset (multipart field `dataset`)
- `POST /generate` - Generate the report for a stored dataset
- `GET /reports/{filename}` - Serve a generated report
*/

pub mod config;
pub mod error;
pub mod frame;
pub mod graph;
pub mod ingest;
pub mod loader;
pub mod preview;
pub mod profile;
pub mod render;
pub mod report;
pub mod stats;
pub mod storage;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use config::Config;
pub use error::{EdaError, Result};
pub use ingest::{StoredDataset, load_dataset, store_upload};
pub use profile::{ProfileConfig, ProfileReport, profile_frame};
pub use render::Templates;
pub use report::generate_report;
pub use storage::{DiskStorage, MemoryStorage, Storage};
