//! How an image is handed to the generation service.
//!
//! Small images travel inline as `data:` URLs. Larger deployments upload each image to the
//! service's file host first and pass the durable URL instead (see
//! [`UploadRelay`](crate::drape::upload_relay::UploadRelay)).

use crate::drape::error::ValidationError;
use crate::drape::validation::MediaType;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;

/// An image reference accepted by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImageRef {
    /// `data:<media type>;base64,<payload>`
    Inline(String),
    /// A fetchable `http(s)` URL.
    Hosted(String),
}

impl ImageRef {
    /// Encode `bytes` as a data URL.
    ///
    /// ```
    /// use drape::image_ref::ImageRef;
    /// use drape::validation::MediaType;
    ///
    /// let r = ImageRef::inline(b"hi", MediaType::Png);
    /// assert_eq!(r.as_str(), "data:image/png;base64,aGk=");
    /// ```
    pub fn inline(bytes: &[u8], media_type: MediaType) -> Self {
        ImageRef::Inline(format!(
            "data:{};base64,{}",
            media_type.as_str(),
            BASE64.encode(bytes)
        ))
    }

    /// Accept a caller-supplied hosted URL. Only `http://` and `https://` are allowed.
    pub fn hosted(url: &str) -> Result<Self, ValidationError> {
        let trimmed = url.trim();
        if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            Ok(ImageRef::Hosted(trimmed.to_string()))
        } else {
            Err(ValidationError::InvalidUrl(trimmed.to_string()))
        }
    }

    /// The reference as sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Inline(s) | ImageRef::Hosted(s) => s,
        }
    }

    /// `true` for data URLs.
    pub fn is_inline(&self) -> bool {
        matches!(self, ImageRef::Inline(_))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Data URLs are megabytes long; never print them whole.
            ImageRef::Inline(s) => write!(f, "{}... ({} chars)", &s[..s.len().min(32)], s.len()),
            ImageRef::Hosted(s) => f.write_str(s),
        }
    }
}
