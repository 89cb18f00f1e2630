//! HTTP front end (`drape serve`).
//!
//! | Method | Path           | Body                                   | Response          |
//! |--------|----------------|----------------------------------------|-------------------|
//! | POST   | `/api/auth`    | `{username, password}`                 | `{success: true}` |
//! | POST   | `/api/logout`  |                                        | `{success: true}` |
//! | POST   | `/api/process` | multipart `modelImage` + `garmentImage`, or `{modelUrl, garmentUrl}` | `{imageUrl}` |
//! | POST   | `/api/upload`  | multipart `file`                       | `{url}`           |
//! | GET    | `/login`       |                                        | login page        |
//! | GET    | `/`            |                                        | landing page      |
//!
//! Every path except `/login` and `/api/auth*` needs the session cookie; requests without it
//! are redirected to `/login`. Errors are JSON `{error}` with 400 for rejected input, 401 for
//! bad credentials and 500 for everything else.
//!
//! Only available with the `server` feature.

use crate::drape::assets::ImageUpload;
use crate::drape::auth::{
    clear_session_cookie, session_token_from_cookie_header, Credentials,
};
use crate::drape::clients::replicate::ReplicateClient;
use crate::drape::config::StudioConfig;
use crate::drape::error::{StudioError, ValidationError};
use crate::drape::pipeline::{TryOnPipeline, BOTH_REQUIRED};
use crate::drape::upload_relay::UploadRelay;
use crate::drape::validation::validate_image;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest request body accepted: two maximal images plus multipart overhead.
pub const MAX_REQUEST_BYTES: usize = 25 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: TryOnPipeline,
    relay: Arc<dyn UploadRelay>,
    credentials: Credentials,
}

impl AppState {
    /// State from explicit parts.
    pub fn new(
        pipeline: TryOnPipeline,
        relay: Arc<dyn UploadRelay>,
        credentials: Credentials,
    ) -> Self {
        Self {
            pipeline,
            relay,
            credentials,
        }
    }

    /// Replicate-backed state from `config`.
    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(
            TryOnPipeline::from_config(config),
            Arc::new(ReplicateClient::from_config(config)),
            Credentials::from_config(config),
        )
    }
}

/// A JSON `{error}` response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        let status = match &err {
            StudioError::Validation(_) => StatusCode::BAD_REQUEST,
            StudioError::Auth => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/login", get(login_page))
        .route("/api/auth", post(login))
        .route("/api/logout", post(logout))
        .route("/api/process", post(process))
        .route("/api/upload", post(upload))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: StudioConfig) -> Result<(), StudioError> {
    let app = router(AppState::from_config(&config));
    let listener = TcpListener::bind(config.bind_addr).await?;
    log::info!(
        "drape::server::serve(...): listening on http://{}",
        config.bind_addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("drape::server::serve(...): cannot listen for Ctrl-C: {}", e);
            }
        })
        .await?;
    log::info!("drape::server::serve(...): shut down");
    Ok(())
}

async fn require_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/login" || path.starts_with("/api/auth") {
        return next.run(request).await;
    }
    let authenticated = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(session_token_from_cookie_header)
        .any(|token| state.credentials.verify_session_token(token));
    if authenticated {
        next.run(request).await
    } else {
        log::debug!(
            "drape::server::require_session(...): redirecting {} to /login",
            request.uri().path()
        );
        Redirect::temporary("/login").into_response()
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state
        .credentials
        .verify(&payload.username, &payload.password)?;
    log::info!("drape::server::login(...): session started");
    Ok((
        [(SET_COOKIE, state.credentials.session_cookie())],
        Json(json!({"success": true})),
    )
        .into_response())
}

async fn logout() -> Response {
    (
        [(SET_COOKIE, clear_session_cookie())],
        Json(json!({"success": true})),
    )
        .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessUrls {
    #[serde(default)]
    model_url: String,
    #[serde(default)]
    garment_url: String,
}

async fn process(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.trim_start().starts_with("application/json"));

    let result = if is_json {
        let Json(urls) = Json::<ProcessUrls>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        state
            .pipeline
            .run_hosted(&urls.model_url, &urls.garment_url)
            .await
    } else {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let mut files = read_files(multipart).await?;
        let (model, garment) = match (files.remove("modelImage"), files.remove("garmentImage")) {
            (Some(model), Some(garment)) => (model, garment),
            _ => return Err(ApiError::bad_request(BOTH_REQUIRED)),
        };
        state
            .pipeline
            .run(model.as_input(), garment.as_input())
            .await
    };

    match result {
        Ok(image_url) => Ok(Json(json!({"imageUrl": image_url})).into_response()),
        Err(e) => {
            if !e.is_validation() {
                log::error!("drape::server::process(...): {}", e);
            }
            Err(e.into())
        }
    }
}

async fn upload(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut files = read_files(multipart).await?;
    let file = files
        .remove("file")
        .ok_or_else(|| StudioError::from(ValidationError::Missing("No file provided.".into())))?;
    let media_type =
        validate_image(&file.declared_type, file.bytes.len() as u64).map_err(StudioError::from)?;

    match state
        .relay
        .upload(&file.bytes, &file.filename, media_type)
        .await
    {
        Ok(url) => Ok(Json(json!({"url": url})).into_response()),
        Err(e) => {
            log::error!("drape::server::upload(...): {}", e);
            Err(e.into())
        }
    }
}

/// Collect every multipart field by name. Later fields with the same name win.
async fn read_files(mut multipart: Multipart) -> Result<HashMap<String, ImageUpload>, ApiError> {
    let mut files = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let filename = field.file_name().unwrap_or(&name).to_string();
        let declared_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        files.insert(
            name,
            ImageUpload::new(filename, declared_type, bytes.to_vec()),
        );
    }
    Ok(files)
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".into(),
    }
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

const LOGIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Drape | Sign in</title></head>
<body>
<form id="login">
  <h1>Drape</h1>
  <label>Username <input name="username" autocomplete="username" required></label>
  <label>Password <input name="password" type="password" autocomplete="current-password" required></label>
  <button type="submit">Sign in</button>
  <p id="error" role="alert"></p>
</form>
<script>
document.getElementById("login").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const res = await fetch("/api/auth", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ username: form.get("username"), password: form.get("password") }),
  });
  if (res.ok) {
    window.location.href = "/";
  } else {
    const data = await res.json().catch(() => ({}));
    document.getElementById("error").textContent = data.error || "Login failed";
  }
});
</script>
</body>
</html>
"#;

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Drape</title></head>
<body>
<h1>Drape</h1>
<p>Signed in. POST a <code>modelImage</code> and a <code>garmentImage</code> to
<code>/api/process</code>, or upload a single <code>file</code> to <code>/api/upload</code>.</p>
<form method="post" action="/api/logout"><button type="submit">Sign out</button></form>
</body>
</html>
"#;
