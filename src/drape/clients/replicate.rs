//! Replicate-backed try-on generation and file hosting.
//!
//! [`ReplicateClient`] implements both [`TryOnGenerator`] (predictions against
//! `google/nano-banana-pro` by default) and [`UploadRelay`] (the `/files` endpoint).
//!
//! A prediction is created with `Prefer: wait`, so short generations come back completed in
//! the first response. Longer ones come back `starting`/`processing` and are polled through
//! their `urls.get` link until they settle.
//!
//! ```rust,no_run
//! use drape::clients::replicate::ReplicateClient;
//! use drape::generation::TryOnGenerator;
//! use drape::image_ref::ImageRef;
//!
//! # async fn demo() -> Result<(), drape::error::StudioError> {
//! let client = ReplicateClient::new(&std::env::var("REPLICATE_API_TOKEN").unwrap_or_default());
//! let url = client
//!     .generate(
//!         &ImageRef::Hosted("https://files.example/model.jpg".into()),
//!         &ImageRef::Hosted("https://files.example/shirt.jpg".into()),
//!     )
//!     .await?;
//! println!("result: {}", url);
//! # Ok(())
//! # }
//! ```

use crate::drape::config::{StudioConfig, DEFAULT_API_BASE};
use crate::drape::error::StudioError;
use crate::drape::generation::{extract_result_url, TryOnGenerator, TryOnOptions, TRY_ON_PROMPT};
use crate::drape::http_client_pool::get_or_create_client;
use crate::drape::image_ref::ImageRef;
use crate::drape::upload_relay::{content_disposition, hosted_url_from_response, UploadRelay};
use crate::drape::validation::MediaType;
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Model used for try-on predictions unless overridden.
pub const DEFAULT_MODEL: &str = "google/nano-banana-pro";

/// Interval between polls of an unfinished prediction.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Give up polling after this long even if the caller set no deadline.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    image_input: [&'a ImageRef; 2],
    #[serde(flatten)]
    options: TryOnOptions,
}

/// Client for Replicate's predictions and files APIs.
#[derive(Clone)]
pub struct ReplicateClient {
    api_base: String,
    api_token: String,
    model: String,
    poll_interval: Duration,
    poll_timeout: Duration,
    http: reqwest::Client,
}

impl ReplicateClient {
    /// Client against the public Replicate API with the default model.
    pub fn new(api_token: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: api_token.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            http: get_or_create_client(DEFAULT_API_BASE),
        }
    }

    /// Client configured from a [`StudioConfig`].
    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(&config.api_token).with_api_base(&config.api_base)
    }

    /// Point the client at another API root (a proxy or a local mock).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.http = get_or_create_client(&self.api_base);
        self
    }

    /// Use another `owner/name` model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Change how often unfinished predictions are polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Change how long polling may continue before giving up.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/models/{}/predictions", self.api_base, self.model)
    }

    fn files_endpoint(&self) -> String {
        format!("{}/files", self.api_base)
    }

    async fn poll_prediction(&self, poll_url: &str) -> Result<Value, StudioError> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .http
                .get(poll_url)
                .bearer_auth(&self.api_token)
                .send()
                .await
                .map_err(|e| {
                    StudioError::GenerationFailed(format!("poll request failed: {}", e))
                })?;
            let prediction = prediction_json(response).await?;
            match prediction_status(&prediction).as_str() {
                "starting" | "processing" => {
                    log::debug!(
                        "drape::clients::replicate::poll_prediction(...): {} still running after {:?}",
                        poll_url,
                        started.elapsed()
                    );
                }
                _ => return Ok(prediction),
            }
            if started.elapsed() >= self.poll_timeout {
                return Err(StudioError::GenerationFailed(format!(
                    "prediction did not finish within {}s",
                    self.poll_timeout.as_secs()
                )));
            }
        }
    }
}

#[async_trait]
impl TryOnGenerator for ReplicateClient {
    async fn generate(
        &self,
        primary: &ImageRef,
        secondary: &ImageRef,
    ) -> Result<String, StudioError> {
        let endpoint = self.predictions_endpoint();
        let request = PredictionRequest {
            input: PredictionInput {
                prompt: TRY_ON_PROMPT,
                image_input: [primary, secondary],
                options: TryOnOptions::default(),
            },
        };
        log::info!(
            "drape::clients::replicate::generate(...): {} with model={} garment={}",
            self.model,
            primary,
            secondary
        );

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                log::error!(
                    "drape::clients::replicate::generate(...): request to {} failed: {}",
                    endpoint,
                    e
                );
                StudioError::GenerationFailed(format!("request failed: {}", e))
            })?;
        let mut prediction = prediction_json(response).await?;

        let status = prediction_status(&prediction);
        if matches!(status.as_str(), "starting" | "processing") {
            let poll_url = prediction
                .get("urls")
                .and_then(|urls| urls.get("get"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    StudioError::GenerationFailed("prediction is missing its poll URL".into())
                })?;
            prediction = self.poll_prediction(&poll_url).await?;
        }

        match prediction_status(&prediction).as_str() {
            "succeeded" => {}
            "failed" | "canceled" => {
                let reason = prediction
                    .get("error")
                    .and_then(Value::as_str)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("prediction {}", prediction_status(&prediction)));
                log::error!("drape::clients::replicate::generate(...): {}", reason);
                return Err(StudioError::GenerationFailed(reason));
            }
            other => {
                return Err(StudioError::GenerationFailed(format!(
                    "unexpected prediction status '{}'",
                    other
                )))
            }
        }

        let output = prediction.get("output").cloned().unwrap_or(Value::Null);
        let url = extract_result_url(&output)?;
        log::info!("drape::clients::replicate::generate(...): result {}", url);
        Ok(url)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl UploadRelay for ReplicateClient {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        media_type: MediaType,
    ) -> Result<String, StudioError> {
        let endpoint = self.files_endpoint();
        log::debug!(
            "drape::clients::replicate::upload(...): {} ({} bytes, {})",
            filename,
            bytes.len(),
            media_type
        );
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, media_type.as_str())
            .header(CONTENT_DISPOSITION, content_disposition(filename))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StudioError::UploadFailed {
                status: 0,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "drape::clients::replicate::upload(...): {} answered {}: {}",
                endpoint,
                status,
                body
            );
            return Err(StudioError::UploadFailed {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StudioError::ExtractionFailed(format!("upload response: {}", e)))?;
        hosted_url_from_response(&body)
    }
}

/// Decode a prediction response, turning HTTP failures into `GenerationFailed` with the
/// service's own explanation when it gave one.
async fn prediction_json(response: reqwest::Response) -> Result<Value, StudioError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| StudioError::GenerationFailed(format!("reading response failed: {}", e)))?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| {
                body.get("detail")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| truncate(&text, 512));
        return Err(StudioError::GenerationFailed(format!(
            "{} {}",
            status.as_u16(),
            detail
        )));
    }
    serde_json::from_str(&text)
        .map_err(|e| StudioError::GenerationFailed(format!("invalid prediction JSON: {}", e)))
}

fn prediction_status(prediction: &Value) -> String {
    prediction
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default()
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
