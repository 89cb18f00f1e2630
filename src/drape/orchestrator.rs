//! The batch orchestrator.
//!
//! A [`Studio`] is one user's working session. It owns the model photos, the garment batch,
//! the gallery, the most recent result and the round-robin counter that decides which model
//! photo each garment is paired with.
//!
//! # Batch loop
//!
//! ```text
//! Idle ──run_batch──► Running { current_index, total, current_model_index } ──► Idle
//!                          │
//!                          ├─ model = models[counter mod N]; counter += 1
//!                          ├─ pipeline.run(model, garment)
//!                          ├─ Ok  → gallery.push(result), latest = result
//!                          └─ Err → "File {n}: {reason}", carry on
//! ```
//!
//! Garments are processed strictly one at a time in submission order. The counter lives on
//! the session, so a second batch picks up where the first left off.
//!
//! # Example
//!
//! ```rust,no_run
//! use drape::assets::ImageUpload;
//! use drape::config::StudioConfig;
//! use drape::orchestrator::Studio;
//! use drape::pipeline::TryOnPipeline;
//!
//! # async fn demo(model: Vec<u8>, shirt: Vec<u8>) -> Result<(), drape::error::StudioError> {
//! let config = StudioConfig::from_env()?;
//! let mut studio = Studio::new(TryOnPipeline::from_config(&config));
//! studio.models_mut().add(vec![ImageUpload::new("me.jpg", "image/jpeg", model)])?;
//! let added = studio.garments_mut().add(vec![ImageUpload::new("tee.png", "image/png", shirt)])?;
//! studio.garments_mut().set_style_code(&added.added[0], "SJ12A")?;
//!
//! let report = studio.run_batch(None).await?;
//! for result in studio.gallery().iter() {
//!     println!("{} -> {}", result.filename, result.result_url);
//! }
//! if let Some(err) = report.last_error() {
//!     eprintln!("{}", err);
//! }
//! # Ok(())
//! # }
//! ```

use crate::drape::assets::{GarmentBatch, ModelSet};
use crate::drape::error::{StudioError, ValidationError};
use crate::drape::event::{BatchEvent, BatchEventHandler};
use crate::drape::gallery::{Gallery, GenerationResult};
use crate::drape::pipeline::TryOnPipeline;
use crate::drape::preview::PreviewRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Where the batch loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    /// No batch is running.
    #[default]
    Idle,
    /// Item `current_index` (0-based) of `total` is in flight.
    Running {
        /// 0-based index of the garment being processed.
        current_index: usize,
        /// Batch size.
        total: usize,
        /// Index of the model photo paired with it.
        current_model_index: usize,
    },
}

/// Read-only view of a session's [`BatchState`], shareable with other tasks.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    state: Arc<RwLock<BatchState>>,
}

impl ProgressHandle {
    /// Current state.
    pub fn state(&self) -> BatchState {
        match self.state.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// `true` while a batch is running.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), BatchState::Running { .. })
    }

    fn set(&self, next: BatchState) {
        match self.state.write() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Resets the progress to `Idle` when the batch ends, however it ends.
struct IdleOnDrop(ProgressHandle);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.set(BatchState::Idle);
    }
}

/// Cooperative cancellation for a running batch. Checked between items; the item in flight
/// always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the batch to stop before its next item.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`CancelFlag::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How one garment of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    /// The result was added to the gallery.
    Success(GenerationResult),
    /// `"File {n}: {reason}"`.
    Failure(String),
    /// Not attempted because the batch was cancelled.
    Skipped,
}

/// One garment's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// 1-based position in the batch.
    pub position: usize,
    /// Id of the garment entry.
    pub garment_id: String,
    /// Model photo used, `None` for skipped items.
    pub model_index: Option<usize>,
    /// What happened.
    pub result: ItemResult,
}

/// Everything a finished batch produced, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One entry per garment.
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Every failure message, in order.
    pub fn errors(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                ItemResult::Failure(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The most recent failure message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.errors().last().copied()
    }

    /// Results produced by this batch, in submission order.
    pub fn succeeded(&self) -> Vec<&GenerationResult> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                ItemResult::Success(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Number of items never attempted.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result == ItemResult::Skipped)
            .count()
    }
}

/// The most recent success, with what produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestResult {
    /// The gallery entry.
    pub result: GenerationResult,
    /// Id of the model photo that was used.
    pub model_id: String,
    /// Style code of the garment.
    pub style_code: String,
}

/// One user's try-on session.
pub struct Studio {
    previews: PreviewRegistry,
    models: ModelSet,
    garments: GarmentBatch,
    pipeline: TryOnPipeline,
    next_model: usize,
    gallery: Gallery,
    latest: Option<LatestResult>,
    progress: ProgressHandle,
    events: Option<Arc<dyn BatchEventHandler>>,
}

impl Studio {
    /// Empty session generating through `pipeline`.
    pub fn new(pipeline: TryOnPipeline) -> Self {
        let previews = PreviewRegistry::new();
        Self {
            models: ModelSet::new(previews.clone()),
            garments: GarmentBatch::new(previews.clone()),
            previews,
            pipeline,
            next_model: 0,
            gallery: Gallery::new(),
            latest: None,
            progress: ProgressHandle::default(),
            events: None,
        }
    }

    /// Receive [`BatchEvent`]s from every batch of this session.
    pub fn with_event_handler(mut self, handler: Arc<dyn BatchEventHandler>) -> Self {
        self.events = Some(handler);
        self
    }

    /// Model photos, in upload order.
    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Mutable model photos.
    pub fn models_mut(&mut self) -> &mut ModelSet {
        &mut self.models
    }

    /// The garment batch.
    pub fn garments(&self) -> &GarmentBatch {
        &self.garments
    }

    /// Mutable garment batch.
    pub fn garments_mut(&mut self) -> &mut GarmentBatch {
        &mut self.garments
    }

    /// Results of every batch, newest first.
    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Mutable gallery.
    pub fn gallery_mut(&mut self) -> &mut Gallery {
        &mut self.gallery
    }

    /// The most recent success of the current or last batch. Cleared when a batch starts.
    pub fn latest(&self) -> Option<&LatestResult> {
        self.latest.as_ref()
    }

    /// Preview references held by this session's images.
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Handle for watching batch progress from elsewhere.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// How many model selections this session has made so far.
    pub fn model_counter(&self) -> usize {
        self.next_model
    }

    /// `true` when a batch could start right now.
    pub fn can_submit(&self) -> bool {
        !self.models.is_empty()
            && self.garments.all_style_codes_valid()
            && !self.progress.is_running()
    }

    /// Run every queued garment, one after another.
    ///
    /// Precondition failures are returned as errors and leave the session untouched. Once the
    /// loop starts, item failures are recorded in the returned [`BatchReport`] and never abort
    /// the batch. The garments stay queued afterwards.
    pub async fn run_batch(
        &mut self,
        cancel: Option<&CancelFlag>,
    ) -> Result<BatchReport, StudioError> {
        if self.progress.is_running() {
            return Err(ValidationError::AlreadyRunning.into());
        }
        if self.models.is_empty() {
            return Err(ValidationError::NoModels.into());
        }
        if self.garments.is_empty() {
            return Err(ValidationError::NoGarments.into());
        }
        let codes = self.garments.parsed_style_codes()?;
        self.latest = None;

        let total = codes.len();
        let model_count = self.models.len();
        log::info!(
            "drape::orchestrator::Studio::run_batch(...): {} garments across {} models with {}",
            total,
            model_count,
            self.pipeline.model_name()
        );
        emit(&self.events, BatchEvent::BatchStarted { total, model_count }).await;

        let _idle = IdleOnDrop(self.progress.clone());
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(total),
        };

        for (index, code) in codes.iter().enumerate() {
            let position = index + 1;
            let garment = match self.garments.get(index) {
                Some(garment) => garment,
                None => break,
            };

            if cancel.map_or(false, CancelFlag::is_cancelled) {
                log::info!(
                    "drape::orchestrator::Studio::run_batch(...): cancelled before item {}",
                    position
                );
                report.outcomes.push(ItemOutcome {
                    position,
                    garment_id: garment.id.clone(),
                    model_index: None,
                    result: ItemResult::Skipped,
                });
                emit(&self.events, BatchEvent::ItemSkipped { position }).await;
                continue;
            }

            let model_index = self.next_model % model_count;
            self.next_model += 1;
            let model = match self.models.get(model_index) {
                Some(model) => model,
                None => break,
            };

            self.progress.set(BatchState::Running {
                current_index: index,
                total,
                current_model_index: model_index,
            });
            emit(
                &self.events,
                BatchEvent::ItemStarted {
                    position,
                    total,
                    model_index,
                    garment_id: garment.id.clone(),
                },
            )
            .await;

            let result = match self.pipeline.run(model.as_input(), garment.as_input()).await {
                Ok(url) => {
                    let generated = GenerationResult::new(url, code.filename(position));
                    log::info!(
                        "drape::orchestrator::Studio::run_batch(...): {} ready",
                        generated.filename
                    );
                    self.gallery.push(generated.clone());
                    self.latest = Some(LatestResult {
                        result: generated.clone(),
                        model_id: model.id.clone(),
                        style_code: code.as_str().to_string(),
                    });
                    emit(
                        &self.events,
                        BatchEvent::ItemSucceeded {
                            position,
                            filename: generated.filename.clone(),
                            result_url: generated.result_url.clone(),
                        },
                    )
                    .await;
                    ItemResult::Success(generated)
                }
                Err(e) => {
                    let message = format!("File {}: {}", position, e);
                    log::error!("drape::orchestrator::Studio::run_batch(...): {}", message);
                    emit(
                        &self.events,
                        BatchEvent::ItemFailed {
                            position,
                            message: message.clone(),
                        },
                    )
                    .await;
                    ItemResult::Failure(message)
                }
            };

            report.outcomes.push(ItemOutcome {
                position,
                garment_id: garment.id.clone(),
                model_index: Some(model_index),
                result,
            });
        }

        let succeeded = report.succeeded().len();
        let failed = report.errors().len();
        let skipped = report.skipped();
        emit(
            &self.events,
            BatchEvent::BatchCompleted {
                succeeded,
                failed,
                skipped,
            },
        )
        .await;
        Ok(report)
    }
}

async fn emit(handler: &Option<Arc<dyn BatchEventHandler>>, event: BatchEvent) {
    if let Some(handler) = handler {
        handler.on_batch_event(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drape::assets::ImageUpload;
    use crate::drape::generation::TryOnGenerator;
    use crate::drape::image_ref::ImageRef;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl TryOnGenerator for Echo {
        async fn generate(&self, _: &ImageRef, _: &ImageRef) -> Result<String, StudioError> {
            Ok("https://out.example/r.jpg".into())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload::new(name, "image/png", vec![1, 2, 3])
    }

    #[test]
    fn cannot_submit_until_every_code_is_valid() {
        let mut studio = Studio::new(TryOnPipeline::new(Arc::new(Echo)));
        assert!(!studio.can_submit());
        studio.models_mut().add(vec![png("m.png")]).unwrap();
        let ids = studio.garments_mut().add(vec![png("a.png"), png("b.png")]).unwrap();
        assert!(!studio.can_submit());
        studio.garments_mut().set_style_code(&ids.added[0], "AB1").unwrap();
        assert!(!studio.can_submit());
        studio.garments_mut().set_style_code(&ids.added[1], "cd-2").unwrap();
        assert!(studio.can_submit());
    }

    #[tokio::test]
    async fn preconditions_leave_the_session_untouched() {
        let mut studio = Studio::new(TryOnPipeline::new(Arc::new(Echo)));
        assert_eq!(
            studio.run_batch(None).await.unwrap_err(),
            StudioError::Validation(ValidationError::NoModels)
        );
        studio.models_mut().add(vec![png("m.png")]).unwrap();
        assert_eq!(
            studio.run_batch(None).await.unwrap_err(),
            StudioError::Validation(ValidationError::NoGarments)
        );
        studio.garments_mut().add(vec![png("g.png")]).unwrap();
        assert!(matches!(
            studio.run_batch(None).await,
            Err(StudioError::Validation(ValidationError::InvalidStyleCode(_)))
        ));
        assert_eq!(studio.model_counter(), 0);
        assert!(studio.gallery().is_empty());
        assert_eq!(studio.progress().state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn state_returns_to_idle_after_a_batch() {
        let mut studio = Studio::new(TryOnPipeline::new(Arc::new(Echo)));
        studio.models_mut().add(vec![png("m.png")]).unwrap();
        let ids = studio.garments_mut().add(vec![png("g.png")]).unwrap();
        studio.garments_mut().set_style_code(&ids.added[0], "zz9q").unwrap();
        let report = studio.run_batch(None).await.unwrap();
        assert_eq!(report.succeeded()[0].filename, "ZZ9-Q-1.jpg");
        assert_eq!(studio.progress().state(), BatchState::Idle);
        assert_eq!(studio.latest().unwrap().style_code, "zz9q");
    }

    #[test]
    fn dropping_the_session_releases_previews() {
        let mut studio = Studio::new(TryOnPipeline::new(Arc::new(Echo)));
        studio.models_mut().add(vec![png("m.png")]).unwrap();
        studio.garments_mut().add(vec![png("g.png")]).unwrap();
        let previews = studio.previews().clone();
        assert_eq!(previews.live_count(), 2);
        drop(studio);
        assert_eq!(previews.live_count(), 0);
    }
}
