//! Model images and garment entries held by a session.
//!
//! Both collections are bounded ([`MAX_MODELS`], [`MAX_GARMENTS`]), validate every file on
//! the way in and own one preview reference per image.

use crate::drape::error::ValidationError;
use crate::drape::preview::{PreviewHandle, PreviewRegistry};
use crate::drape::style_code::{is_valid_style_code, sanitize_style_code, StyleCode};
use crate::drape::validation::{validate_image, MediaType};
use uuid::Uuid;

/// Largest number of model images a session may hold.
pub const MAX_MODELS: usize = 20;
/// Largest number of garments in one batch.
pub const MAX_GARMENTS: usize = 10;

/// A file as received from the user, before validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original filename.
    pub filename: String,
    /// Content type declared by the client.
    pub declared_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Convenience constructor.
    pub fn new(
        filename: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            declared_type: declared_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Borrow as a pipeline input.
    pub fn as_input(&self) -> ImageInput<'_> {
        ImageInput {
            filename: &self.filename,
            declared_type: &self.declared_type,
            bytes: &self.bytes,
        }
    }
}

/// Borrowed view of an image handed to the try-on pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    /// Filename used when relaying the file to the host.
    pub filename: &'a str,
    /// Declared content type, validated again by the pipeline.
    pub declared_type: &'a str,
    /// Raw bytes.
    pub bytes: &'a [u8],
}

/// Result of adding files to a bounded collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Ids of the entries that were added, in order.
    pub added: Vec<String>,
    /// Files dropped because the collection ran out of room.
    pub ignored: usize,
}

impl AddOutcome {
    /// User-facing notice when files were dropped, e.g.
    /// `"Only 2 more files can be added. Extra files were ignored."`
    pub fn notice(&self) -> Option<String> {
        if self.ignored == 0 {
            return None;
        }
        let accepted = self.added.len();
        Some(format!(
            "Only {} more file{} can be added. Extra files were ignored.",
            accepted,
            if accepted == 1 { "" } else { "s" }
        ))
    }
}

/// A reference photo of a person.
#[derive(Debug)]
pub struct ModelImage {
    /// Stable id within the session.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// Validated media type.
    pub media_type: MediaType,
    /// Raw bytes.
    pub bytes: Vec<u8>,
    preview: PreviewHandle,
}

impl ModelImage {
    /// The preview reference held for this image.
    pub fn preview(&self) -> &str {
        self.preview.reference()
    }

    /// Borrow as a pipeline input.
    pub fn as_input(&self) -> ImageInput<'_> {
        ImageInput {
            filename: &self.filename,
            declared_type: self.media_type.as_str(),
            bytes: &self.bytes,
        }
    }
}

/// A flat-lay garment photo and its user-edited style code.
#[derive(Debug)]
pub struct GarmentEntry {
    /// Stable id within the session.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// Validated media type.
    pub media_type: MediaType,
    /// Raw bytes.
    pub bytes: Vec<u8>,
    style_code: String,
    preview: PreviewHandle,
}

impl GarmentEntry {
    /// The style code as currently edited (possibly not yet valid).
    pub fn style_code(&self) -> &str {
        &self.style_code
    }

    /// The preview reference held for this garment.
    pub fn preview(&self) -> &str {
        self.preview.reference()
    }

    /// Borrow as a pipeline input.
    pub fn as_input(&self) -> ImageInput<'_> {
        ImageInput {
            filename: &self.filename,
            declared_type: self.media_type.as_str(),
            bytes: &self.bytes,
        }
    }
}

/// Validate an incoming batch of files against a collection with `current` entries out of
/// `max`. Either every accepted file is valid or nothing is admitted.
fn admit(
    files: Vec<ImageUpload>,
    current: usize,
    max: usize,
    kind: &'static str,
) -> Result<(Vec<(ImageUpload, MediaType)>, usize), ValidationError> {
    let remaining = max.saturating_sub(current);
    if remaining == 0 {
        return Err(ValidationError::CollectionFull { kind, max });
    }
    let ignored = files.len().saturating_sub(remaining);
    let mut admitted = Vec::with_capacity(files.len().min(remaining));
    for file in files.into_iter().take(remaining) {
        let media_type = validate_image(&file.declared_type, file.bytes.len() as u64)?;
        admitted.push((file, media_type));
    }
    Ok((admitted, ignored))
}

/// The session's model images, in the order they were added.
#[derive(Debug, Default)]
pub struct ModelSet {
    images: Vec<ModelImage>,
    previews: PreviewRegistry,
}

impl ModelSet {
    /// Create an empty set issuing previews from `previews`.
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            images: Vec::new(),
            previews,
        }
    }

    /// Add files, up to the remaining capacity.
    pub fn add(&mut self, files: Vec<ImageUpload>) -> Result<AddOutcome, ValidationError> {
        let (admitted, ignored) = admit(files, self.images.len(), MAX_MODELS, "model")?;
        let mut outcome = AddOutcome {
            added: Vec::with_capacity(admitted.len()),
            ignored,
        };
        for (file, media_type) in admitted {
            let id = format!("model-{}", Uuid::new_v4());
            outcome.added.push(id.clone());
            self.images.push(ModelImage {
                id,
                filename: file.filename,
                media_type,
                bytes: file.bytes,
                preview: self.previews.acquire(),
            });
        }
        Ok(outcome)
    }

    /// Remove one image. Returns `false` if `id` is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|m| m.id != id);
        before != self.images.len()
    }

    /// Remove every image.
    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Image at `index`.
    pub fn get(&self, index: usize) -> Option<&ModelImage> {
        self.images.get(index)
    }

    /// Number of images held.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// `true` when no images are held.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelImage> {
        self.images.iter()
    }
}

/// The garments queued for the next batch, in submission order.
#[derive(Debug, Default)]
pub struct GarmentBatch {
    entries: Vec<GarmentEntry>,
    previews: PreviewRegistry,
}

impl GarmentBatch {
    /// Create an empty batch issuing previews from `previews`.
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            entries: Vec::new(),
            previews,
        }
    }

    /// Add files with empty style codes, up to the remaining capacity.
    pub fn add(&mut self, files: Vec<ImageUpload>) -> Result<AddOutcome, ValidationError> {
        let (admitted, ignored) = admit(files, self.entries.len(), MAX_GARMENTS, "garment")?;
        let mut outcome = AddOutcome {
            added: Vec::with_capacity(admitted.len()),
            ignored,
        };
        for (file, media_type) in admitted {
            let id = format!("garment-{}", Uuid::new_v4());
            outcome.added.push(id.clone());
            self.entries.push(GarmentEntry {
                id,
                filename: file.filename,
                media_type,
                bytes: file.bytes,
                style_code: String::new(),
                preview: self.previews.acquire(),
            });
        }
        Ok(outcome)
    }

    /// Store a sanitized copy of `raw` as the style code of garment `id`.
    /// Returns the stored value.
    pub fn set_style_code(&mut self, id: &str, raw: &str) -> Result<String, ValidationError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ValidationError::UnknownImage(id.to_string()))?;
        entry.style_code = sanitize_style_code(raw);
        Ok(entry.style_code.clone())
    }

    /// Remove one garment. Returns `false` if `id` is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Remove every garment.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `true` when the batch is non-empty and every code matches the pattern.
    pub fn all_style_codes_valid(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|e| is_valid_style_code(&e.style_code))
    }

    /// Parse every style code, failing on the first invalid one.
    pub fn parsed_style_codes(&self) -> Result<Vec<StyleCode>, ValidationError> {
        self.entries
            .iter()
            .map(|e| StyleCode::parse(&e.style_code))
            .collect()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&GarmentEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &GarmentEntry> {
        self.entries.iter()
    }
}
