// Replicate client tests against a local mock of the predictions and files APIs.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use drape::clients::replicate::ReplicateClient;
use drape::error::StudioError;
use drape::generation::{TryOnGenerator, TRY_ON_PROMPT};
use drape::image_ref::ImageRef;
use drape::upload_relay::UploadRelay;
use drape::validation::MediaType;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Scenario {
    Immediate,
    Polled,
    Failed,
    Rejected,
    NoOutput,
}

#[derive(Clone)]
struct Mock {
    scenario: Scenario,
    polls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn create_prediction(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.seen.lock().unwrap().push((headers, body));
    match mock.scenario {
        Scenario::Immediate => (
            StatusCode::CREATED,
            Json(json!({"id": "p1", "status": "succeeded", "output": "https://replicate.delivery/p1.jpg"})),
        ),
        Scenario::Polled => (
            StatusCode::CREATED,
            Json(json!({
                "id": "p1",
                "status": "starting",
                "urls": {"get": format!("http://{}/v1/predictions/p1", host)}
            })),
        ),
        Scenario::Failed => (
            StatusCode::CREATED,
            Json(json!({"id": "p1", "status": "failed", "error": "NSFW content detected"})),
        ),
        Scenario::Rejected => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "Invalid image_input"})),
        ),
        Scenario::NoOutput => (
            StatusCode::CREATED,
            Json(json!({"id": "p1", "status": "succeeded", "output": {}})),
        ),
    }
}

async fn get_prediction(State(mock): State<Mock>) -> Json<Value> {
    let poll = mock.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if poll < 3 {
        Json(json!({"id": "p1", "status": "processing"}))
    } else {
        Json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/p1-polled.jpg"]
        }))
    }
}

async fn create_file(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if body.len() > 8 {
        return (StatusCode::PAYLOAD_TOO_LARGE, "too big".to_string()).into_response();
    }
    if content_type != "image/png" || !disposition.contains("filename=\"tee.png\"") {
        return (StatusCode::BAD_REQUEST, "bad headers".to_string()).into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": "f1", "urls": {"get": "https://api.replicate.com/v1/files/f1"}})),
    )
        .into_response()
}

async fn spawn(scenario: Scenario) -> (String, Mock) {
    let mock = Mock {
        scenario,
        polls: Arc::new(AtomicUsize::new(0)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route(
            "/v1/models/google/nano-banana-pro/predictions",
            post(create_prediction),
        )
        .route("/v1/predictions/{id}", get(get_prediction))
        .route("/v1/files", post(create_file))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1", addr), mock)
}

fn client(base: &str) -> ReplicateClient {
    ReplicateClient::new("r8_test")
        .with_api_base(base)
        .with_poll_interval(Duration::from_millis(10))
}

fn pair() -> (ImageRef, ImageRef) {
    (
        ImageRef::inline(b"model", MediaType::Jpeg),
        ImageRef::Hosted("https://files.example/tee.png".into()),
    )
}

#[tokio::test]
async fn test_waits_for_synchronous_result() {
    let (base, mock) = spawn(Scenario::Immediate).await;
    let (model, garment) = pair();

    let url = client(&base).generate(&model, &garment).await.unwrap();
    assert_eq!(url, "https://replicate.delivery/p1.jpg");

    let seen = mock.seen.lock().unwrap();
    let (headers, body) = &seen[0];
    assert_eq!(headers.get("prefer").unwrap(), "wait");
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer r8_test");
    assert_eq!(body["input"]["prompt"], TRY_ON_PROMPT);
    assert_eq!(
        body["input"]["image_input"],
        json!([model.as_str(), "https://files.example/tee.png"])
    );
    assert_eq!(body["input"]["aspect_ratio"], "match_input_image");
    assert_eq!(body["input"]["output_format"], "jpg");
}

#[tokio::test]
async fn test_polls_until_prediction_settles() {
    let (base, mock) = spawn(Scenario::Polled).await;
    let (model, garment) = pair();

    let url = client(&base).generate(&model, &garment).await.unwrap();
    assert_eq!(url, "https://replicate.delivery/p1-polled.jpg");
    assert_eq!(mock.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_prediction_surfaces_reason() {
    let (base, _) = spawn(Scenario::Failed).await;
    let (model, garment) = pair();

    let err = client(&base).generate(&model, &garment).await.unwrap_err();
    assert_eq!(
        err,
        StudioError::GenerationFailed("NSFW content detected".into())
    );
}

#[tokio::test]
async fn test_http_error_uses_detail_field() {
    let (base, _) = spawn(Scenario::Rejected).await;
    let (model, garment) = pair();

    let err = client(&base).generate(&model, &garment).await.unwrap_err();
    assert_eq!(
        err,
        StudioError::GenerationFailed("422 Invalid image_input".into())
    );
}

#[tokio::test]
async fn test_missing_output_is_an_extraction_failure() {
    let (base, _) = spawn(Scenario::NoOutput).await;
    let (model, garment) = pair();

    let err = client(&base).generate(&model, &garment).await.unwrap_err();
    assert!(matches!(err, StudioError::ExtractionFailed(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_a_generation_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (model, garment) = pair();

    let err = client(&format!("http://{}/v1", addr))
        .generate(&model, &garment)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::GenerationFailed(_)));
}

#[tokio::test]
async fn test_upload_returns_hosted_url() {
    let (base, _) = spawn(Scenario::Immediate).await;

    let url = client(&base)
        .upload(b"png", "tee.png", MediaType::Png)
        .await
        .unwrap();
    assert_eq!(url, "https://api.replicate.com/v1/files/f1");
}

#[tokio::test]
async fn test_upload_failure_keeps_status_and_body() {
    let (base, _) = spawn(Scenario::Immediate).await;

    let err = client(&base)
        .upload(b"far too many bytes", "tee.png", MediaType::Png)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StudioError::UploadFailed {
            status: 413,
            body: "too big".into()
        }
    );
}
