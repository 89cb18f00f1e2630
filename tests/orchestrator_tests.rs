// Batch orchestration tests.
//
// A scripted generator stands in for the remote service so that model selection, naming,
// partial failure and cancellation can be checked without network access.

use async_trait::async_trait;
use drape::assets::ImageUpload;
use drape::error::StudioError;
use drape::event::{BatchEvent, BatchEventHandler};
use drape::generation::TryOnGenerator;
use drape::image_ref::ImageRef;
use drape::orchestrator::{CancelFlag, ItemResult};
use drape::validation::MediaType;
use drape::{Studio, TryOnPipeline};
use std::sync::{Arc, Mutex};

/// Records the model reference of every call and fails the calls listed in `fail_on`
/// (1-based).
#[derive(Default)]
struct ScriptedGenerator {
    primaries: Mutex<Vec<String>>,
    fail_on: Vec<usize>,
}

#[async_trait]
impl TryOnGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        primary: &ImageRef,
        _secondary: &ImageRef,
    ) -> Result<String, StudioError> {
        let call = {
            let mut primaries = self.primaries.lock().unwrap();
            primaries.push(primary.as_str().to_string());
            primaries.len()
        };
        if self.fail_on.contains(&call) {
            return Err(StudioError::GenerationFailed("boom".into()));
        }
        Ok(format!("https://replicate.delivery/out/{}.jpg", call))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

impl ScriptedGenerator {
    /// Model names ("A", "B", ...) in call order.
    fn models_used(&self) -> Vec<String> {
        self.primaries
            .lock()
            .unwrap()
            .iter()
            .map(|r| model_name_of(r))
            .collect()
    }
}

fn model_name_of(reference: &str) -> String {
    for name in ["A", "B", "C"] {
        if ImageRef::inline(name.as_bytes(), MediaType::Png).as_str() == reference {
            return name.to_string();
        }
    }
    "?".to_string()
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<BatchEvent>>,
    cancel_after_first: Option<CancelFlag>,
}

#[async_trait]
impl BatchEventHandler for EventLog {
    async fn on_batch_event(&self, event: &BatchEvent) {
        if let (BatchEvent::ItemSucceeded { position: 1, .. }, Some(flag)) =
            (event, &self.cancel_after_first)
        {
            flag.cancel();
        }
        self.events.lock().unwrap().push(event.clone());
    }
}

fn studio_with(generator: Arc<ScriptedGenerator>) -> Studio {
    Studio::new(TryOnPipeline::new(generator))
}

fn add_models(studio: &mut Studio, names: &[&str]) {
    let files = names
        .iter()
        .map(|n| ImageUpload::new(format!("{}.png", n), "image/png", n.as_bytes().to_vec()))
        .collect();
    studio.models_mut().add(files).unwrap();
}

fn add_garments(studio: &mut Studio, codes: &[&str]) {
    let files = codes
        .iter()
        .map(|c| ImageUpload::new(format!("{}.jpg", c), "image/jpeg", b"garment".to_vec()))
        .collect();
    let added = studio.garments_mut().add(files).unwrap();
    for (id, code) in added.added.iter().zip(codes) {
        studio.garments_mut().set_style_code(id, code).unwrap();
    }
}

#[tokio::test]
async fn test_end_to_end_pairing_and_naming() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut studio = studio_with(generator.clone());
    add_models(&mut studio, &["A", "B"]);
    add_garments(&mut studio, &["sj12A", "sj12B", "xy9C"]);

    let report = studio.run_batch(None).await.unwrap();

    assert_eq!(generator.models_used(), vec!["A", "B", "A"]);
    let names: Vec<&str> = report
        .succeeded()
        .iter()
        .map(|r| r.filename.as_str())
        .collect();
    assert_eq!(names, vec!["SJ12-A-1.jpg", "SJ12-B-2.jpg", "XY9-C-3.jpg"]);

    let gallery: Vec<&str> = studio.gallery().iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(gallery, vec!["XY9-C-3.jpg", "SJ12-B-2.jpg", "SJ12-A-1.jpg"]);

    let latest = studio.latest().unwrap();
    assert_eq!(latest.result.filename, "XY9-C-3.jpg");
    assert_eq!(latest.style_code, "xy9C");
    assert_eq!(latest.model_id, studio.models().get(0).unwrap().id);
    assert!(report.last_error().is_none());
}

#[tokio::test]
async fn test_round_robin_continues_across_batches() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut studio = studio_with(generator.clone());
    add_models(&mut studio, &["A", "B", "C"]);
    add_garments(&mut studio, &["aa1", "bb2"]);

    studio.run_batch(None).await.unwrap();
    let second = studio.run_batch(None).await.unwrap();

    assert_eq!(generator.models_used(), vec!["A", "B", "C", "A"]);
    assert_eq!(studio.model_counter(), 4);
    let used: Vec<Option<usize>> = second.outcomes.iter().map(|o| o.model_index).collect();
    assert_eq!(used, vec![Some(2), Some(0)]);
    // Sequence numbers restart with each batch.
    assert_eq!(second.succeeded()[0].filename, "AA-1-1.jpg");
    assert_eq!(studio.gallery().len(), 4);
}

#[tokio::test]
async fn test_partial_failure_keeps_going() {
    let generator = Arc::new(ScriptedGenerator {
        fail_on: vec![3],
        ..ScriptedGenerator::default()
    });
    let mut studio = studio_with(generator.clone());
    add_models(&mut studio, &["A"]);
    add_garments(&mut studio, &["ab1", "ab2", "ab3", "ab4", "ab5"]);

    let report = studio.run_batch(None).await.unwrap();

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.errors(), vec!["File 3: Generation failed: boom"]);
    assert_eq!(report.last_error(), Some("File 3: Generation failed: boom"));
    let positions: Vec<usize> = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.result, ItemResult::Success(_)))
        .map(|o| o.position)
        .collect();
    assert_eq!(positions, vec![1, 2, 4, 5]);
    assert_eq!(studio.gallery().len(), 4);
    assert_eq!(studio.latest().unwrap().result.filename, "AB-5-5.jpg");
    assert!(!studio.progress().is_running());
}

#[tokio::test]
async fn test_latest_is_cleared_when_a_batch_starts() {
    let generator = Arc::new(ScriptedGenerator {
        fail_on: vec![2],
        ..ScriptedGenerator::default()
    });
    let mut studio = studio_with(generator);
    add_models(&mut studio, &["A"]);
    add_garments(&mut studio, &["ab1"]);

    studio.run_batch(None).await.unwrap();
    assert_eq!(studio.latest().unwrap().result.filename, "AB-1-1.jpg");

    let report = studio.run_batch(None).await.unwrap();
    assert!(report.succeeded().is_empty());
    assert!(studio.latest().is_none());
    // The gallery keeps results across batches.
    assert_eq!(studio.gallery().len(), 1);
}

#[tokio::test]
async fn test_events_follow_the_loop() {
    let generator = Arc::new(ScriptedGenerator {
        fail_on: vec![2],
        ..ScriptedGenerator::default()
    });
    let log = Arc::new(EventLog::default());
    let mut studio = Studio::new(TryOnPipeline::new(generator)).with_event_handler(log.clone());
    add_models(&mut studio, &["A", "B"]);
    add_garments(&mut studio, &["xx1", "yy2"]);

    studio.run_batch(None).await.unwrap();

    let events = log.events.lock().unwrap();
    assert_eq!(
        events.first(),
        Some(&BatchEvent::BatchStarted {
            total: 2,
            model_count: 2
        })
    );
    assert!(matches!(
        events[1],
        BatchEvent::ItemStarted {
            position: 1,
            model_index: 0,
            ..
        }
    ));
    assert!(matches!(events[2], BatchEvent::ItemSucceeded { position: 1, .. }));
    assert!(matches!(
        events[3],
        BatchEvent::ItemStarted {
            position: 2,
            model_index: 1,
            ..
        }
    ));
    assert!(matches!(events[4], BatchEvent::ItemFailed { position: 2, .. }));
    assert_eq!(
        events.last(),
        Some(&BatchEvent::BatchCompleted {
            succeeded: 1,
            failed: 1,
            skipped: 0
        })
    );
}

#[tokio::test]
async fn test_cancellation_skips_remaining_items() {
    let generator = Arc::new(ScriptedGenerator::default());
    let cancel = CancelFlag::new();
    let log = Arc::new(EventLog {
        cancel_after_first: Some(cancel.clone()),
        ..EventLog::default()
    });
    let mut studio =
        Studio::new(TryOnPipeline::new(generator.clone())).with_event_handler(log.clone());
    add_models(&mut studio, &["A", "B"]);
    add_garments(&mut studio, &["aa1", "bb2", "cc3"]);

    let report = studio.run_batch(Some(&cancel)).await.unwrap();

    assert_eq!(report.succeeded().len(), 1);
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.outcomes[1].result, ItemResult::Skipped);
    assert_eq!(report.outcomes[2].model_index, None);
    assert_eq!(generator.models_used(), vec!["A"]);
    // Skipped items do not consume a model slot.
    assert_eq!(studio.model_counter(), 1);
}

#[tokio::test]
async fn test_invalid_style_code_blocks_submission() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut studio = studio_with(generator.clone());
    add_models(&mut studio, &["A"]);
    add_garments(&mut studio, &["ok1", "x"]);

    assert!(!studio.can_submit());
    let err = studio.run_batch(None).await.unwrap_err();
    assert!(err.is_validation());
    assert!(generator.models_used().is_empty());
}

#[test]
fn test_previews_released_on_every_removal_path() {
    let mut studio = studio_with(Arc::new(ScriptedGenerator::default()));
    add_models(&mut studio, &["A", "B", "C"]);
    add_garments(&mut studio, &["aa1", "bb2"]);
    let previews = studio.previews().clone();
    assert_eq!(previews.live_count(), 5);

    let first = studio.models().get(0).unwrap();
    let (first_id, first_preview) = (first.id.clone(), first.preview().to_string());
    assert!(studio.models_mut().remove(&first_id));
    assert!(!previews.is_live(&first_preview));
    assert_eq!(previews.live_count(), 4);

    studio.garments_mut().clear();
    assert_eq!(previews.live_count(), 2);

    drop(studio);
    assert_eq!(previews.live_count(), 0);
}
