//! # Tests HTTP de conflict-web
//!
//! Formulaire, upload multipart, redirection, téléchargement à usage unique
//! et codes d'erreur.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use geo::{Geometry, LineString, Polygon};
use http_body_util::BodyExt;
use tower::ServiceExt;

use conflict_web::server::{self, AppState};
use conflict_web::ServerConfig;
use vocation::{Crs, Dataset, Feature, Field, FieldKind, Value};

const BOUNDARY: &str = "conflict-web-test-boundary";

fn rect(x: f64, y: f64, w: f64, h: f64) -> Polygon {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x, y + h),
            (x + w, y + h),
            (x + w, y),
            (x, y),
        ]),
        vec![],
    )
}

fn write_reference(dir: &Path) -> PathBuf {
    let mut ds = Dataset::new(
        vec![Field::new("Vocacion", FieldKind::Text)],
        Some(Crs::from_epsg(4326)),
    );
    ds.features.push(Feature {
        geometry: Some(Geometry::Polygon(rect(-71.0, 6.8, 0.5, 0.5))),
        values: vec![Value::Text("Ganadera".into())],
    });
    let shp = dir.join("static/vocation_Arauca.shp");
    vocation::write_dataset(&ds, &shp).unwrap();
    shp
}

/// Archive ZIP d'un shapefile d'une parcelle « Forest » en zone Ganadera
fn upload_archive(dir: &Path) -> Vec<u8> {
    upload_archive_with_field(dir, "class")
}

fn upload_archive_with_field(dir: &Path, class_field: &str) -> Vec<u8> {
    let mut ds = Dataset::new(
        vec![Field::new(class_field, FieldKind::Text)],
        Some(Crs::from_epsg(4326)),
    );
    ds.features.push(Feature {
        geometry: Some(Geometry::Polygon(rect(-70.9, 6.9, 0.1, 0.1))),
        values: vec![Value::Text("Forest".into())],
    });
    let shp = dir.join("upload/cobertura.shp");
    vocation::write_dataset(&ds, &shp).unwrap();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::FileOptions::default();
        for ext in ["shp", "shx", "dbf", "prj"] {
            let path = shp.with_extension(ext);
            zip.start_file(format!("cobertura/cobertura.{}", ext), options)
                .unwrap();
            zip.write_all(&std::fs::read(path).unwrap()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

fn test_app(root: &Path) -> axum::Router {
    test_app_with_ttl(root, conflict_web::config::DEFAULT_RESULT_TTL_SECS)
}

fn test_app_with_ttl(root: &Path, result_ttl_secs: u64) -> axum::Router {
    let config = ServerConfig {
        reference: write_reference(root),
        work_dir: root.join("work"),
        result_ttl_secs,
        ..ServerConfig::default()
    };
    server::app(AppState::new(config))
}

async fn post_upload(app: &axum::Router, archive: &[u8]) -> String {
    let response = app
        .clone()
        .oneshot(multipart_request("file1", archive))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn multipart_request(field: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"upload.zip\"\r\nContent-Type: application/zip\r\n\r\n",
            b = BOUNDARY,
            f = field
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::http::Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn error_message(response: axum::http::Response<Body>) -> String {
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    json["error"]["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let tmp = tempfile::tempdir().unwrap();
    let response = test_app(tmp.path()).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn test_index_form() {
    let tmp = tempfile::tempdir().unwrap();
    let response = test_app(tmp.path()).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("multipart/form-data"));
    assert!(html.contains("name=\"file1\""));
}

#[tokio::test]
async fn test_post_without_file() {
    let tmp = tempfile::tempdir().unwrap();
    let response = test_app(tmp.path())
        .oneshot(multipart_request("other", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "No file uploaded");
}

#[tokio::test]
async fn test_post_archive_without_shapefile() {
    let tmp = tempfile::tempdir().unwrap();
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("readme.txt", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"no shapefile here").unwrap();
        zip.finish().unwrap();
    }

    let response = test_app(tmp.path())
        .oneshot(multipart_request("file1", &buf.into_inner()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "No valid shapefile found in the uploaded file"
    );
    // Aucun résultat ne subsiste
    let results = tmp.path().join("work/results");
    assert_eq!(std::fs::read_dir(results).unwrap().count(), 0);
}

#[tokio::test]
async fn test_processing_error_is_hidden() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());
    let archive = upload_archive(tmp.path());
    // Référence supprimée après la configuration
    std::fs::remove_file(tmp.path().join("static/vocation_Arauca.shp")).unwrap();

    let response = app
        .oneshot(multipart_request("file1", &archive))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_message(response).await,
        "Error processing the shapefiles"
    );
}

#[tokio::test]
async fn test_download_unknown() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());

    for uri in [
        "/download/not-a-uuid/conflict.zip",
        "/download/6f1c2a9e-3b5d-4c7e-9a1f-2d3e4f5a6b7c/conflict.zip",
        "/download/6f1c2a9e-3b5d-4c7e-9a1f-2d3e4f5a6b7c/..",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_upload_classify_download() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());

    let response = app
        .clone()
        .oneshot(multipart_request("file1", &upload_archive(tmp.path())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("/download/"));
    assert!(location.ends_with("/conflict.zip"));

    let response = app.clone().oneshot(get(&location)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("attachment"));

    let bytes = body_bytes(response).await;
    let archive = tmp.path().join("downloaded.zip");
    std::fs::write(&archive, &bytes).unwrap();

    let mut names: Vec<String> = zip::ZipArchive::new(Cursor::new(&bytes))
        .unwrap()
        .file_names()
        .map(str::to_string)
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["conflict.dbf", "conflict.prj", "conflict.shp", "conflict.shx"]
    );

    let shp = vocation::extract_shapefile(&archive, &tmp.path().join("check")).unwrap();
    let result = vocation::load(&shp).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(
        result.value(0, "Vocacion").and_then(Value::as_text),
        Some("Ganadera")
    );
    assert_eq!(
        result.value(0, "Level 2").and_then(Value::as_text),
        Some("31")
    );
    assert_eq!(
        result.value(0, "Conflict_L").and_then(Value::as_text),
        Some("High")
    );

    // Téléchargement à usage unique
    let response = app.oneshot(get(&location)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_class_attribute() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = upload_archive_with_field(tmp.path(), "cobertura");

    let response = test_app(tmp.path())
        .oneshot(multipart_request("file1", &archive))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_message(response).await,
        "Error processing the shapefiles"
    );
    let results = tmp.path().join("work/results");
    assert_eq!(std::fs::read_dir(results).unwrap().count(), 0);
}

#[tokio::test]
async fn test_expired_result_is_swept() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app_with_ttl(tmp.path(), 0);
    let archive = upload_archive(tmp.path());

    // Le second upload purge le résultat jamais téléchargé du premier
    let first = post_upload(&app, &archive).await;
    let second = post_upload(&app, &archive).await;
    assert_ne!(first, second);

    let response = app.clone().oneshot(get(&first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get(&second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        std::fs::read_dir(tmp.path().join("work/results")).unwrap().count(),
        0
    );
}
