//! The remote try-on generation seam.
//!
//! [`TryOnGenerator`] is implemented by [`ReplicateClient`](crate::clients::replicate::ReplicateClient)
//! and by test doubles. One call sends a model photo, a garment photo and the fixed
//! [`TRY_ON_PROMPT`] to the service and yields the URL of the composited image.
//!
//! # Example
//!
//! ```rust,no_run
//! use drape::generation::TryOnGenerator;
//! use drape::image_ref::ImageRef;
//! use std::sync::Arc;
//!
//! # async fn demo(client: Arc<dyn TryOnGenerator>) -> Result<(), drape::error::StudioError> {
//! let model = ImageRef::Hosted("https://files.example/model.jpg".into());
//! let garment = ImageRef::Hosted("https://files.example/shirt.jpg".into());
//! let url = client.generate(&model, &garment).await?;
//! println!("{} produced {}", client.model_name(), url);
//! # Ok(())
//! # }
//! ```

use crate::drape::error::StudioError;
use crate::drape::image_ref::ImageRef;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Instruction sent with every pair. Not configurable.
pub const TRY_ON_PROMPT: &str = "Virtual try-on: Replace the shirt/top the person is wearing in the first image \
with the garment shown in the second image. \
Keep the person's face, hair, body pose, skin tone, and proportions exactly the same. \
Preserve the original background, scene lighting, shadows, and color temperature. \
The new garment should fit naturally on the person's body with realistic fabric texture, \
drape, wrinkles, and stitching details matching the flat-lay garment provided. \
Produce a photorealistic, catalog-quality image with sharp focus and seamless blending.";

/// Fixed output parameters sent alongside the prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TryOnOptions {
    /// Output aspect ratio. Matched to the model photo.
    pub aspect_ratio: &'static str,
    /// Output resolution.
    pub resolution: &'static str,
    /// Output file format.
    pub output_format: &'static str,
    /// Safety filter strictness.
    pub safety_filter_level: &'static str,
}

impl Default for TryOnOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: "match_input_image",
            resolution: "4K",
            output_format: "jpg",
            safety_filter_level: "block_only_high",
        }
    }
}

/// A service that composites a garment onto a model photo.
///
/// Implementations perform exactly one attempt per call. Transport and service failures
/// are reported as [`StudioError::GenerationFailed`] with the underlying reason; a response
/// without a usable URL is [`StudioError::ExtractionFailed`].
#[async_trait]
pub trait TryOnGenerator: Send + Sync {
    /// Composite `secondary` (the garment) onto `primary` (the model photo) and return the
    /// URL of the result.
    async fn generate(&self, primary: &ImageRef, secondary: &ImageRef)
        -> Result<String, StudioError>;

    /// Identifier of the remote model, e.g. `"google/nano-banana-pro"`.
    fn model_name(&self) -> &str;
}

/// Derive the single result URL from a prediction's `output` value.
///
/// Accepts a URL string, an array whose first usable element is a URL, or an object with a
/// `url` field.
///
/// ```
/// use drape::generation::extract_result_url;
/// use serde_json::json;
///
/// assert_eq!(
///     extract_result_url(&json!(["https://r.example/out.jpg"])).unwrap(),
///     "https://r.example/out.jpg"
/// );
/// assert!(extract_result_url(&json!("[object Object]")).is_err());
/// ```
pub fn extract_result_url(output: &Value) -> Result<String, StudioError> {
    find_url(output).ok_or_else(|| {
        let mut shown = output.to_string();
        if shown.len() > 200 {
            shown.truncate(200);
            shown.push_str("...");
        }
        StudioError::ExtractionFailed(shown)
    })
}

fn find_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
                Some(trimmed.to_string())
            } else {
                None
            }
        }
        Value::Array(items) => items.iter().find_map(find_url),
        Value::Object(obj) => obj.get("url").and_then(find_url),
        _ => None,
    }
}
