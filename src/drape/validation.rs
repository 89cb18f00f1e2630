//! Upload policy for model and garment images.
//!
//! Only JPEG and PNG are accepted, and no file may exceed [`MAX_IMAGE_BYTES`]. The same check
//! is applied to model photos, garment photos and raw uploads.
//!
//! ```
//! use drape::validation::{validate_image, MediaType, MAX_IMAGE_BYTES};
//!
//! assert_eq!(validate_image("image/png", 1024), Ok(MediaType::Png));
//! assert!(validate_image("image/png", MAX_IMAGE_BYTES + 1).is_err());
//! assert!(validate_image("image/gif", 10).is_err());
//! ```

use crate::drape::error::ValidationError;
use std::fmt;
use std::path::Path;

/// Largest accepted image, in bytes (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// The two accepted image media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
}

impl MediaType {
    /// Parse a declared content type. Case and parameters (`; charset=...`) are ignored.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            _ => None,
        }
    }

    /// Guess the declared type of a local file from its extension, the way a browser file
    /// picker would. Unknown extensions map to `application/octet-stream` so that the
    /// validator rejects them with the usual message.
    pub fn declared_for_path(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            _ => "application/octet-stream",
        }
    }

    /// Canonical MIME string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpg",
            MediaType::Png => "png",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a candidate image against the upload policy.
///
/// The type is checked before the size, so an oversized GIF reports `InvalidType`.
pub fn validate_image(declared_type: &str, size_bytes: u64) -> Result<MediaType, ValidationError> {
    let media_type =
        MediaType::from_declared(declared_type).ok_or_else(|| ValidationError::InvalidType {
            declared: declared_type.to_string(),
        })?;
    if size_bytes > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge { size: size_bytes });
    }
    Ok(media_type)
}

/// [`validate_image`] with the failure prefixed by `label` (e.g. `"Model image"`).
pub fn validate_labeled(
    label: &str,
    declared_type: &str,
    size_bytes: u64,
) -> Result<MediaType, ValidationError> {
    validate_image(declared_type, size_bytes).map_err(|e| e.labeled(label))
}
