#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use eda_report::app::{AppState, build_router};
use eda_report::{Config, DiskStorage, MemoryStorage, Storage};

const BOUNDARY: &str = "eda-test-boundary";

fn setup() -> (TempDir, Config, Router) {
    setup_with(|_| {})
}

/// Router over a temp-dir disk store, with the config adjusted before use
fn setup_with(adjust: impl FnOnce(&mut Config)) -> (TempDir, Config, Router) {
    let root = tempfile::tempdir().unwrap();
    let mut config = Config::rooted_at(root.path());
    adjust(&mut config);
    config.ensure_directories().unwrap();
    let storage = Arc::new(DiskStorage::from_config(&config));
    let state = AppState::new(config.clone(), storage).unwrap();
    (root, config, build_router(state))
}

fn multipart_request(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn generate_request(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn stored_filename(html: &str) -> String {
    let re = Regex::new(r#"name="stored_filename" value="(dataset_[0-9a-f]{32}\.[a-z]+)""#).unwrap();
    re.captures(html).unwrap()[1].to_string()
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// Follow a flash redirect and return the messages page
async fn follow_flash(app: &Router, response: Response<Body>) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let page = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    body_text(page).await
}

#[tokio::test]
async fn index_page_has_upload_form() {
    let (_root, _config, app) = setup();
    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("action=\"/upload\""));
    assert!(html.contains("name=\"dataset\""));
    assert!(!html.contains("action=\"/generate\""));
}

#[tokio::test]
async fn csv_upload_then_generate_serves_report() {
    let (_root, config, app) = setup();
    let csv = b"name,score,passed\nana,9.5,true\nbo,7.0,false\ncy,8.25,true\n";

    let response = app
        .clone()
        .oneshot(multipart_request("dataset", "data.csv", csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(html.matches("<tr>").count(), 3);
    let name_at = html.find("<th>name</th>").unwrap();
    let score_at = html.find("<th>score</th>").unwrap();
    let passed_at = html.find("<th>passed</th>").unwrap();
    assert!(name_at < score_at && score_at < passed_at);

    let stored = stored_filename(&html);
    assert!(config.upload_dir.join(&stored).exists());

    let response = app
        .clone()
        .oneshot(generate_request(&format!("stored_filename={}", stored)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    let stem = stored.trim_end_matches(".csv");
    let report_url = format!("/reports/report_{}.html", stem);
    assert!(html.contains(&report_url));

    let report = app.clone().oneshot(get(&report_url, None)).await.unwrap();
    assert_eq!(report.status(), StatusCode::OK);
    let content_type = report.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    assert!(report.headers().get(header::CONTENT_DISPOSITION).is_none());
    let report_html = body_text(report).await;
    assert!(report_html.contains("Automated EDA Report"));
}

#[tokio::test]
async fn generating_twice_reuses_the_report_name() {
    let (_root, config, app) = setup();
    let response = app
        .clone()
        .oneshot(multipart_request("dataset", "data.csv", b"a,b\n1,2\n3,4\n"))
        .await
        .unwrap();
    let stored = stored_filename(&body_text(response).await);
    let form = format!("stored_filename={}", stored);

    let first = body_text(app.clone().oneshot(generate_request(&form)).await.unwrap()).await;
    let second = body_text(app.clone().oneshot(generate_request(&form)).await.unwrap()).await;
    let link = Regex::new(r"/reports/(report_dataset_[0-9a-f]{32}\.html)").unwrap();
    assert_eq!(&link.captures(&first).unwrap()[1], &link.captures(&second).unwrap()[1]);
    assert_eq!(files_in(&config.report_dir), 1);
}

#[tokio::test]
async fn preview_is_limited_to_ten_rows() {
    let (_root, _config, app) = setup();
    let mut csv = String::from("n,square\n");
    for i in 0..25 {
        csv.push_str(&format!("{},{}\n", i, i * i));
    }
    let response = app
        .oneshot(multipart_request("dataset", "big.CSV", csv.as_bytes()))
        .await
        .unwrap();
    let html = body_text(response).await;
    assert_eq!(html.matches("<tr>").count(), 10);
    assert!(stored_filename(&html).ends_with(".csv"));
}

#[tokio::test]
async fn xlsx_upload_previews_first_sheet() {
    let (_root, _config, app) = setup();
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "city").unwrap();
    sheet.write_string(0, 1, "population").unwrap();
    sheet.write_string(1, 0, "Lyon").unwrap();
    sheet.write_number(1, 1, 522_000).unwrap();
    sheet.write_string(2, 0, "Nantes").unwrap();
    sheet.write_number(2, 1, 320_000).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let response = app
        .oneshot(multipart_request("dataset", "cities.xlsx", &bytes))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<th>city</th>"));
    assert!(html.contains("<td>Nantes</td>"));
    assert_eq!(html.matches("<tr>").count(), 2);
    assert!(stored_filename(&html).ends_with(".xlsx"));
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_writing() {
    let (_root, config, app) = setup();
    let response = app
        .clone()
        .oneshot(multipart_request("dataset", "notes.txt", b"hello"))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("Unsupported file type. Please upload CSV or Excel."));
    assert_eq!(files_in(&config.upload_dir), 0);
}

#[tokio::test]
async fn missing_field_and_empty_filename_are_reported() {
    let (_root, _config, app) = setup();

    let response = app
        .clone()
        .oneshot(multipart_request("other", "data.csv", b"a\n1\n"))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("No file part in the request"));

    let response = app
        .clone()
        .oneshot(multipart_request("dataset", "", b""))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("No file selected"));
}

#[tokio::test]
async fn unreadable_upload_is_reported_and_kept() {
    let (_root, config, app) = setup();
    let response = app
        .clone()
        .oneshot(multipart_request("dataset", "broken.xlsx", b"not a workbook"))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("Failed to read file: "));
    assert_eq!(files_in(&config.upload_dir), 1);
}

#[tokio::test]
async fn generate_rejects_missing_and_unknown_references() {
    let (_root, _config, app) = setup();

    let response = app.clone().oneshot(generate_request("")).await.unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("Missing file reference. Please upload again."));

    let response = app
        .clone()
        .oneshot(generate_request("stored_filename=..%2FCargo.toml"))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("Uploaded file not found. Please upload again."));

    let response = app
        .clone()
        .oneshot(generate_request(
            "stored_filename=dataset_0123456789abcdef0123456789abcdef.csv",
        ))
        .await
        .unwrap();
    let html = follow_flash(&app, response).await;
    assert!(html.contains("Uploaded file not found. Please upload again."));
}

#[tokio::test]
async fn flash_messages_are_shown_once() {
    let (_root, _config, app) = setup();
    let response = app.clone().oneshot(generate_request("")).await.unwrap();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let first = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    let cleared = first.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cleared.starts_with("flash="));
    assert!(body_text(first).await.contains("Missing file reference"));

    let second = body_text(app.clone().oneshot(get("/", None)).await.unwrap()).await;
    assert!(!second.contains("Missing file reference"));
}

#[tokio::test]
async fn tampered_flash_cookie_is_ignored() {
    let (_root, _config, app) = setup();
    let response = app
        .oneshot(get("/", Some("flash=forged%20message")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("forged message"));
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let (_root, _config, app) = setup();
    let response = app
        .clone()
        .oneshot(get("/reports/report_missing.html", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/reports/../Cargo.toml", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_refused_without_writing() {
    let (_root, config, app) = setup_with(|config| config.max_upload_bytes = 1024);
    let mut csv = String::from("n,text\n");
    for i in 0..200 {
        csv.push_str(&format!("{},padding padding padding\n", i));
    }
    assert!(csv.len() > 1024);

    let response = app
        .oneshot(multipart_request("dataset", "big.csv", csv.as_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(files_in(&config.upload_dir), 0);
}

#[tokio::test]
async fn reports_are_served_from_the_configured_storage() {
    let root = tempfile::tempdir().unwrap();
    let config = Config::rooted_at(root.path());
    let storage = Arc::new(MemoryStorage::new());
    let name = "report_dataset_0123456789abcdef0123456789abcdef.html";
    storage.save_report(name, "<html>stored in memory</html>").unwrap();
    let app = build_router(AppState::new(config, storage).unwrap());

    let response = app
        .clone()
        .oneshot(get(&format!("/reports/{}", name), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    assert_eq!(body_text(response).await, "<html>stored in memory</html>");

    let response = app
        .oneshot(get(
            "/reports/report_dataset_ffffffffffffffffffffffffffffffff.html",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn float_cells_preview_with_six_significant_digits() {
    let (_root, _config, app) = setup();
    let csv = b"ratio,label\n0.3333333333333333,a\n0.30000000000000004,b\n2,c\n";
    let response = app
        .oneshot(multipart_request("dataset", "ratios.csv", csv))
        .await
        .unwrap();
    let html = body_text(response).await;
    assert!(html.contains("<td>0.333333</td>"));
    assert!(html.contains("<td>0.3</td>"));
    assert!(html.contains("<td>2.0</td>"));
}
