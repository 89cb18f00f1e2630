//! # Drape
//!
//! Drape is a virtual try-on studio. It takes one or more photos of a person (the *model*
//! images) and a batch of flat-lay garment photos, pairs them round-robin and sends each pair
//! to a remote image-generation service (Replicate, `google/nano-banana-pro`) that dresses the
//! person in the garment. Results are named after the garment's style code and collected in a
//! session gallery that can be downloaded or pruned.
//!
//! The crate provides:
//!
//! * **Validation**: [`validation`] enforces the JPEG/PNG and 10 MB upload policy,
//!   [`style_code`] the `^[A-Za-z0-9]{2,20}$` style codes and the
//!   `{STYLE}-{COLOR}-{sequence}.jpg` naming rule.
//! * **Generation**: the [`generation::TryOnGenerator`] and [`upload_relay::UploadRelay`]
//!   seams, implemented for Replicate by [`clients::replicate::ReplicateClient`], and the
//!   [`TryOnPipeline`] that validates a pair, references its images inline or via the relay
//!   and calls the generator under a deadline.
//! * **Batches**: [`Studio`] owns a session's model photos, garment batch, gallery and
//!   round-robin counter and runs batches strictly one item at a time, reporting per-item
//!   outcomes and [`event::BatchEvent`]s.
//! * **Serving** (`server` feature): an axum service exposing `/api/auth`, `/api/process` and
//!   `/api/upload` behind a session cookie.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use drape::assets::ImageUpload;
//! use drape::config::StudioConfig;
//! use drape::{Studio, TryOnPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     drape::init_logger();
//!
//!     let config = StudioConfig::from_env()?;
//!     let mut studio = Studio::new(TryOnPipeline::from_config(&config));
//!
//!     studio.models_mut().add(vec![ImageUpload::new(
//!         "model.jpg",
//!         "image/jpeg",
//!         std::fs::read("model.jpg")?,
//!     )])?;
//!     let added = studio.garments_mut().add(vec![ImageUpload::new(
//!         "tee.png",
//!         "image/png",
//!         std::fs::read("tee.png")?,
//!     )])?;
//!     studio.garments_mut().set_style_code(&added.added[0], "SJ12A")?;
//!
//!     let report = studio.run_batch(None).await?;
//!     for result in report.succeeded() {
//!         println!("{} -> {}", result.filename, result.result_url);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding Drape can opt in to `RUST_LOG` driven diagnostics without choosing
/// a logging backend upfront.
///
/// ```rust
/// drape::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `drape` module.
pub mod drape;

// Re-exporting key items for easier external access.
pub use drape::assets;
pub use drape::auth;
pub use drape::clients;
pub use drape::config;
pub use drape::error;
pub use drape::event;
pub use drape::gallery;
pub use drape::generation;
pub use drape::http_client_pool;
pub use drape::image_ref;
pub use drape::orchestrator;
pub use drape::pipeline;
pub use drape::preview;
#[cfg(feature = "server")]
pub use drape::server;
pub use drape::style_code;
pub use drape::upload_relay;
pub use drape::validation;

pub use drape::config::StudioConfig;
pub use drape::error::{StudioError, ValidationError};
pub use drape::{Studio, TryOnPipeline};
