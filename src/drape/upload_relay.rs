//! Upload relay: turn raw image bytes into a durable hosted URL.
//!
//! Inline data URLs inflate every request by a third and some deployments cap request
//! bodies, so images can be pushed to the generation service's file host first. The hosted
//! URL is then passed to the generator in place of the bytes.

use crate::drape::error::StudioError;
use crate::drape::validation::MediaType;
use async_trait::async_trait;
use serde_json::Value;

/// A file host that stores bytes and hands back a fetchable URL.
///
/// Each call performs exactly one upload. Identical content is not deduplicated and failures
/// are not retried.
#[async_trait]
pub trait UploadRelay: Send + Sync {
    /// Store `bytes` under `filename` and return the hosted URL.
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        media_type: MediaType,
    ) -> Result<String, StudioError>;
}

/// `Content-Disposition` value for an uploaded file.
///
/// Quotes, backslashes and control characters are dropped from the plain `filename`
/// parameter; the exact name travels percent-encoded in `filename*`.
///
/// ```
/// use drape::upload_relay::content_disposition;
///
/// assert_eq!(
///     content_disposition("shirt \"blue\".jpg"),
///     "attachment; filename=\"shirt blue.jpg\"; filename*=UTF-8''shirt%20%22blue%22.jpg"
/// );
/// ```
pub fn content_disposition(filename: &str) -> String {
    let plain: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        plain,
        urlencoding::encode(filename)
    )
}

/// Pull the durable fetch URL (`urls.get`) out of a file-host response.
pub fn hosted_url_from_response(body: &Value) -> Result<String, StudioError> {
    body.get("urls")
        .and_then(|urls| urls.get("get"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StudioError::ExtractionFailed(format!("no urls.get in {}", body)))
}
