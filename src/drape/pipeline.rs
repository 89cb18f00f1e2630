//! One model/garment pair, from raw bytes to a result URL.
//!
//! [`TryOnPipeline`] is shared by the `/api/process` endpoint and by the batch orchestrator.
//! It validates both images, turns them into [`ImageRef`]s according to the configured
//! [`ReferenceMode`] and calls the generator under a deadline. The deadline covers the relay
//! uploads as well as the generation call itself.

use crate::drape::assets::ImageInput;
use crate::drape::clients::replicate::ReplicateClient;
use crate::drape::config::{ReferenceMode, StudioConfig, DEFAULT_GENERATION_TIMEOUT};
use crate::drape::error::{StudioError, ValidationError};
use crate::drape::generation::TryOnGenerator;
use crate::drape::image_ref::ImageRef;
use crate::drape::upload_relay::UploadRelay;
use crate::drape::validation::{validate_labeled, MediaType};
use std::sync::Arc;
use std::time::Duration;

/// Label used for the person photo in validation messages.
pub const MODEL_LABEL: &str = "Model image";
/// Label used for the garment photo in validation messages.
pub const GARMENT_LABEL: &str = "Garment image";
/// Message returned when one half of a pair is absent.
pub const BOTH_REQUIRED: &str = "Both model image and garment image are required.";

/// Validates, references and generates one try-on pair.
#[derive(Clone)]
pub struct TryOnPipeline {
    generator: Arc<dyn TryOnGenerator>,
    relay: Option<Arc<dyn UploadRelay>>,
    reference_mode: ReferenceMode,
    timeout: Duration,
}

impl TryOnPipeline {
    /// Pipeline with inline references and the default deadline.
    pub fn new(generator: Arc<dyn TryOnGenerator>) -> Self {
        Self {
            generator,
            relay: None,
            reference_mode: ReferenceMode::Inline,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    /// Replicate-backed pipeline built from `config`. The same client acts as generator and
    /// relay.
    pub fn from_config(config: &StudioConfig) -> Self {
        let client = Arc::new(ReplicateClient::from_config(config));
        Self::new(client.clone())
            .with_relay(client)
            .with_reference_mode(config.reference_mode)
            .with_timeout(config.generation_timeout)
    }

    /// Relay used in [`ReferenceMode::Hosted`].
    pub fn with_relay(mut self, relay: Arc<dyn UploadRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Choose inline or hosted references.
    pub fn with_reference_mode(mut self, mode: ReferenceMode) -> Self {
        self.reference_mode = mode;
        self
    }

    /// Deadline for one pair, uploads included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the remote model behind this pipeline.
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Run a pair supplied as raw bytes.
    pub async fn run(
        &self,
        model: ImageInput<'_>,
        garment: ImageInput<'_>,
    ) -> Result<String, StudioError> {
        let model_type =
            validate_labeled(MODEL_LABEL, model.declared_type, model.bytes.len() as u64)?;
        let garment_type =
            validate_labeled(GARMENT_LABEL, garment.declared_type, garment.bytes.len() as u64)?;

        self.within_deadline(async {
            let primary = self.reference(model, model_type).await?;
            let secondary = self.reference(garment, garment_type).await?;
            self.generator.generate(&primary, &secondary).await
        })
        .await
    }

    /// Run a pair whose images are already hosted.
    pub async fn run_hosted(
        &self,
        model_url: &str,
        garment_url: &str,
    ) -> Result<String, StudioError> {
        if model_url.trim().is_empty() || garment_url.trim().is_empty() {
            return Err(ValidationError::Missing(BOTH_REQUIRED.to_string()).into());
        }
        let primary = ImageRef::hosted(model_url).map_err(|e| e.labeled(MODEL_LABEL))?;
        let secondary = ImageRef::hosted(garment_url).map_err(|e| e.labeled(GARMENT_LABEL))?;
        self.within_deadline(self.generator.generate(&primary, &secondary))
            .await
    }

    async fn reference(
        &self,
        input: ImageInput<'_>,
        media_type: MediaType,
    ) -> Result<ImageRef, StudioError> {
        match self.reference_mode {
            ReferenceMode::Inline => Ok(ImageRef::inline(input.bytes, media_type)),
            ReferenceMode::Hosted => {
                let relay = self.relay.as_ref().ok_or_else(|| {
                    StudioError::Config("hosted image references need an upload relay".into())
                })?;
                let url = relay.upload(input.bytes, input.filename, media_type).await?;
                Ok(ImageRef::Hosted(url))
            }
        }
    }

    async fn within_deadline<F>(&self, work: F) -> Result<String, StudioError>
    where
        F: std::future::Future<Output = Result<String, StudioError>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "drape::pipeline::TryOnPipeline::run(...): {} timed out after {}s",
                    self.generator.model_name(),
                    self.timeout.as_secs()
                );
                Err(StudioError::GenerationFailed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
