use axum::{
    Form, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, FromRef, Multipart, Path, State, multipart::MultipartRejection,
        rejection::FormRejection,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{EdaError, Result};
use crate::ingest::{
    is_valid_report_filename, is_valid_stored_filename, load_dataset, store_upload,
};
use crate::loader::allowed_file;
use crate::preview::render_preview;
use crate::render::{IndexPage, Templates};
use crate::report::generate_report;
use crate::storage::{DiskStorage, Storage};

const FLASH_COOKIE: &str = "flash";
const UPLOAD_FIELD: &str = "dataset";

const NO_FILE_PART: &str = "No file part in the request";
const NO_FILE_SELECTED: &str = "No file selected";
const UNSUPPORTED_FILE: &str = "Unsupported file type. Please upload CSV or Excel.";
const MISSING_REFERENCE: &str = "Missing file reference. Please upload again.";
const UPLOAD_NOT_FOUND: &str = "Uploaded file not found. Please upload again.";

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub templates: Arc<Templates>,
    key: Key,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let key = signing_key(&config.secret_key);
        Ok(Self {
            config: Arc::new(config),
            storage,
            templates: Arc::new(Templates::new()?),
            key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Cookie signing keys need 64 bytes; stretch the configured secret with SHA-512
fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

#[derive(Deserialize)]
struct GenerateForm {
    #[serde(default)]
    stored_filename: String,
}

/// Build the application router
///
/// # Routes
/// * `GET /` - Upload page, showing and clearing pending flash messages
/// * `POST /upload` - Store a dataset and show its preview
/// * `POST /generate` - Profile a stored dataset and link to the report
/// * `GET /reports/:filename` - A generated report, read through the storage
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/generate", post(generate))
        .route("/reports/:filename", get(report))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the application until the process is stopped
pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    config.ensure_directories()?;
    let storage = Arc::new(DiskStorage::from_config(&config));
    let state = AppState::new(config, storage)?;
    let addr = state.config.bind_addr.clone();

    let listener = TcpListener::bind(addr.as_str()).await?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

async fn index(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let (jar, messages) = take_flashes(jar);
    let page = IndexPage {
        messages,
        ..base_page(&state)
    };
    (jar, render_index(&state, &page)).into_response()
}

async fn upload(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(error = %rejection, "upload without multipart body");
            return flash_redirect(jar, NO_FILE_PART);
        }
    };

    let (filename, bytes) = match read_upload_field(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return flash_redirect(jar, NO_FILE_PART),
        Err(response) => return response,
    };

    if filename.is_empty() {
        return flash_redirect(jar, NO_FILE_SELECTED);
    }
    if !allowed_file(&filename) {
        info!(%filename, "rejected upload with unsupported extension");
        return flash_redirect(jar, UNSUPPORTED_FILE);
    }

    let storage = state.storage.clone();
    let parsed = spawn_blocking(move || {
        let dataset = store_upload(storage.as_ref(), &filename, &bytes)?;
        let frame = load_dataset(storage.as_ref(), &dataset.stored_filename)?;
        Ok::<_, EdaError>((dataset, render_preview(&frame)?))
    })
    .await;

    let (dataset, preview_html) = match parsed {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to read upload");
            return flash_redirect(jar, &format!("Failed to read file: {}", e));
        }
        Err(e) => {
            error!(error = %e, "upload task failed");
            return flash_redirect(jar, &format!("Failed to read file: {}", e));
        }
    };

    let (jar, messages) = take_flashes(jar);
    let page = IndexPage {
        messages,
        preview_html: Some(preview_html),
        file_token: Some(dataset.token),
        stored_filename: Some(dataset.stored_filename),
        ..base_page(&state)
    };
    (jar, render_index(&state, &page)).into_response()
}

/// Pull the `dataset` field out of a multipart body
///
/// Returns `Ok(None)` when the body has no such field. Errors while reading
/// the body (for instance an exceeded size limit) become the response.
async fn read_upload_field(
    multipart: &mut Multipart,
) -> std::result::Result<Option<(String, Bytes)>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return Err((e.status(), e.body_text()).into_response());
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        return match field.bytes().await {
            Ok(bytes) => Ok(Some((filename, bytes))),
            Err(e) => {
                warn!(error = %e, "failed to receive upload");
                Err((e.status(), e.body_text()).into_response())
            }
        };
    }
}

async fn generate(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    form: std::result::Result<Form<GenerateForm>, FormRejection>,
) -> Response {
    let stored_filename = match form {
        Ok(Form(form)) => form.stored_filename,
        Err(rejection) => {
            warn!(error = %rejection, "generate without form body");
            String::new()
        }
    };

    if stored_filename.is_empty() {
        return flash_redirect(jar, MISSING_REFERENCE);
    }
    if !is_valid_stored_filename(&stored_filename)
        || !state.storage.dataset_exists(&stored_filename)
    {
        info!(stored = %stored_filename, "generate for unknown dataset");
        return flash_redirect(jar, UPLOAD_NOT_FOUND);
    }

    let storage = state.storage.clone();
    let templates = state.templates.clone();
    let generated = spawn_blocking(move || {
        generate_report(storage.as_ref(), templates.as_ref(), &stored_filename)
    })
    .await;

    let report_name = match generated {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            warn!(error = %e, "report generation failed");
            return flash_redirect(jar, &format!("Failed to generate report: {}", e));
        }
        Err(e) => {
            error!(error = %e, "report task failed");
            return flash_redirect(jar, &format!("Failed to generate report: {}", e));
        }
    };

    let (jar, messages) = take_flashes(jar);
    let page = IndexPage {
        messages,
        report_url: Some(format!("/reports/{}", report_name)),
        ..base_page(&state)
    };
    (jar, render_index(&state, &page)).into_response()
}

async fn report(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    if !is_valid_report_filename(&filename) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let storage = state.storage.clone();
    let stored = spawn_blocking(move || storage.read_report(&filename)).await;
    match stored {
        Ok(Ok(Some(html))) => Html(html).into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to read report");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
        Err(e) => {
            error!(error = %e, "report task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn base_page(state: &AppState) -> IndexPage {
    IndexPage {
        max_upload_mb: state.config.max_upload_bytes / (1024 * 1024),
        ..IndexPage::default()
    }
}

fn render_index(state: &AppState, page: &IndexPage) -> Response {
    match state.templates.render_index(page) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render index page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn read_flashes(jar: &SignedCookieJar) -> Vec<String> {
    jar.get(FLASH_COOKIE)
        .and_then(|cookie| {
            urlencoding::decode(cookie.value())
                .ok()
                .map(|text| text.into_owned())
        })
        .map(|text| {
            text.split('\n')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Consume pending flash messages, clearing the cookie
fn take_flashes(jar: SignedCookieJar) -> (SignedCookieJar, Vec<String>) {
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, Vec::new());
    }
    let messages = read_flashes(&jar);
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, messages)
}

/// Queue a flash message and send the browser back to the upload page
fn flash_redirect(jar: SignedCookieJar, message: &str) -> Response {
    let mut messages = read_flashes(&jar);
    messages.push(message.replace('\n', " "));
    let value = urlencoding::encode(&messages.join("\n")).into_owned();

    let cookie = Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true);
    (jar.add(cookie), Redirect::to("/")).into_response()
}
