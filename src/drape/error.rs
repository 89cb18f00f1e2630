//! Error taxonomy shared by every Drape component.
//!
//! Two layers are distinguished:
//!
//! * [`ValidationError`] covers everything that can be rejected locally, before any network
//!   call is attempted: bad media types, oversized files, missing uploads, malformed style
//!   codes and batch preconditions.
//! * [`StudioError`] wraps validation failures and adds the upstream failures reported by the
//!   generation service and the file-hosting endpoint.
//!
//! ```
//! use drape::error::{StudioError, ValidationError};
//!
//! let err = StudioError::from(ValidationError::TooLarge { size: 11 * 1024 * 1024 });
//! assert!(err.is_validation());
//! assert_eq!(err.to_string(), "File is too large. Maximum size is 10MB.");
//! ```

use std::error::Error;
use std::fmt;

/// Locally detectable input problems. Terminal for the request or batch item they occur in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Declared media type is not one of the accepted image types.
    InvalidType {
        /// The media type the client declared.
        declared: String,
    },
    /// File exceeds the maximum accepted size.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
    },
    /// A required file or field was not supplied.
    Missing(String),
    /// A hosted image reference is not an `http(s)` URL.
    InvalidUrl(String),
    /// Style code does not match `^[A-Za-z0-9]{2,20}$`.
    InvalidStyleCode(String),
    /// A batch was requested without any model images.
    NoModels,
    /// A batch was requested without any garment entries.
    NoGarments,
    /// A collection already holds its maximum number of images.
    CollectionFull {
        /// Human readable collection kind ("model", "garment").
        kind: &'static str,
        /// Capacity of the collection.
        max: usize,
    },
    /// A batch is already running on this session.
    AlreadyRunning,
    /// No image with the given id exists in the collection.
    UnknownImage(String),
    /// Another validation error, prefixed with the image it concerns.
    Labeled {
        /// Label such as `"Model image"`.
        label: String,
        /// The underlying failure.
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Prefix this error with an image label (e.g. `"Garment image"`).
    pub fn labeled(self, label: impl Into<String>) -> Self {
        ValidationError::Labeled {
            label: label.into(),
            source: Box::new(self),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidType { .. } => {
                write!(f, "Invalid file type. Please upload a JPEG or PNG image.")
            }
            ValidationError::TooLarge { .. } => {
                write!(f, "File is too large. Maximum size is 10MB.")
            }
            ValidationError::Missing(what) => write!(f, "{}", what),
            ValidationError::InvalidUrl(url) => {
                write!(f, "Expected an http(s) image URL, got '{}'", url)
            }
            ValidationError::InvalidStyleCode(code) => write!(
                f,
                "Invalid style code '{}': use 2-20 letters or digits.",
                code
            ),
            ValidationError::NoModels => write!(f, "Add at least one model image."),
            ValidationError::NoGarments => write!(f, "Add at least one garment image."),
            ValidationError::CollectionFull { kind, max } => {
                write!(f, "Maximum {} {} images allowed.", max, kind)
            }
            ValidationError::AlreadyRunning => write!(f, "A batch is already running."),
            ValidationError::UnknownImage(id) => write!(f, "No image with id {}", id),
            ValidationError::Labeled { label, source } => write!(f, "{}: {}", label, source),
        }
    }
}

impl Error for ValidationError {}

/// Every failure a Drape operation can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    /// Input rejected before any remote call was made.
    Validation(ValidationError),
    /// The file-hosting endpoint answered with a non-success status, or could not be reached.
    UploadFailed {
        /// HTTP status returned by the remote; 0 when no response arrived.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The generation service (or the transport to it) failed.
    GenerationFailed(String),
    /// A response arrived but no usable URL could be derived from it.
    ExtractionFailed(String),
    /// Credential mismatch. Deliberately carries no detail.
    Auth,
    /// Required configuration is missing or malformed.
    Config(String),
    /// Local filesystem failure (gallery downloads, CLI input files).
    Io(String),
}

impl StudioError {
    /// `true` for locally detected input problems.
    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation(_))
    }

    /// `true` for failures reported by, or while talking to, the remote service.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            StudioError::UploadFailed { .. }
                | StudioError::GenerationFailed(_)
                | StudioError::ExtractionFailed(_)
        )
    }
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudioError::Validation(err) => write!(f, "{}", err),
            StudioError::UploadFailed { status: 0, body } => write!(f, "Upload failed: {}", body),
            StudioError::UploadFailed { status, body } => {
                write!(f, "Upload failed: {} {}", status, body)
            }
            StudioError::GenerationFailed(reason) => write!(f, "Generation failed: {}", reason),
            StudioError::ExtractionFailed(detail) => {
                write!(f, "Could not extract image URL from output: {}", detail)
            }
            StudioError::Auth => write!(f, "Invalid credentials"),
            StudioError::Config(detail) => write!(f, "Configuration error: {}", detail),
            StudioError::Io(detail) => write!(f, "I/O error: {}", detail),
        }
    }
}

impl Error for StudioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StudioError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StudioError {
    fn from(err: ValidationError) -> Self {
        StudioError::Validation(err)
    }
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_errors_prefix_the_message() {
        let err = ValidationError::InvalidType {
            declared: "image/gif".into(),
        }
        .labeled("Model image");
        assert_eq!(
            err.to_string(),
            "Model image: Invalid file type. Please upload a JPEG or PNG image."
        );
    }

    #[test]
    fn upload_failures_keep_status_and_body() {
        let err = StudioError::UploadFailed {
            status: 413,
            body: "payload too large".into(),
        };
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "Upload failed: 413 payload too large");
    }

    #[test]
    fn auth_error_is_generic() {
        assert_eq!(StudioError::Auth.to_string(), "Invalid credentials");
        assert!(!StudioError::Auth.is_upstream());
    }
}
