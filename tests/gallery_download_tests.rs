// Gallery download tests against a local file server.

use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use drape::gallery::{download_one, Gallery, GenerationResult};
use std::time::{Duration, Instant};

async fn serve_image(UrlPath(name): UrlPath<String>) -> impl IntoResponse {
    if name == "gone.jpg" {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    (StatusCode::OK, format!("bytes of {}", name).into_bytes())
}

async fn spawn() -> String {
    let app = Router::new().route("/out/{name}", get(serve_image));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn result(id: &str, base: &str, remote: &str, filename: &str) -> GenerationResult {
    GenerationResult {
        id: id.to_string(),
        result_url: format!("{}/out/{}", base, remote),
        filename: filename.to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_download_one_saves_under_result_filename() {
    let base = spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let item = result("r1", &base, "a.jpg", "SJ12-A-1.jpg");

    let path = download_one(&item, dir.path()).await.unwrap();

    assert_eq!(path, dir.path().join("SJ12-A-1.jpg"));
    assert_eq!(std::fs::read(&path).unwrap(), b"bytes of a.jpg");
}

#[tokio::test]
async fn test_download_many_collects_failures_and_continues() {
    let base = spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let mut gallery = Gallery::new();
    gallery.push(result("r1", &base, "a.jpg", "SJ12-A-1.jpg"));
    gallery.push(result("r2", &base, "gone.jpg", "SJ12-B-2.jpg"));
    gallery.push(result("r3", &base, "c.jpg", "XY9-C-3.jpg"));
    gallery.push(result("r4", &base, "d.jpg", "NOT-D-4.jpg"));

    let started = Instant::now();
    let report = gallery
        .download_many(&["r1", "r2", "r3"][..], dir.path(), Duration::from_millis(50))
        .await;

    // Gallery order is newest first: r3, r2, r1. Two pauses between three items.
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(
        report.saved,
        vec![dir.path().join("XY9-C-3.jpg"), dir.path().join("SJ12-A-1.jpg")]
    );
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "r2");
    assert!(!report.is_complete());
    assert!(!dir.path().join("NOT-D-4.jpg").exists());
}

#[tokio::test]
async fn test_repeated_downloads_do_not_overwrite() {
    let base = spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let item = result("r1", &base, "a.jpg", "SJ12-A-1.jpg");

    download_one(&item, dir.path()).await.unwrap();
    let second = download_one(&item, dir.path()).await.unwrap();

    assert_eq!(second, dir.path().join("SJ12-A-1 (1).jpg"));
}
