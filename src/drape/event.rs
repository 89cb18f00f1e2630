//! Batch progress events.
//!
//! Implement [`BatchEventHandler`] to observe a [`Studio`](crate::orchestrator::Studio) batch
//! as it runs: which garment is being processed, which model photo was paired with it and
//! how each item ended. The single method has a default no-op implementation.
//!
//! # Event flow
//!
//! ```text
//! BatchStarted { total: 3 }
//!   ├─ ItemStarted { position: 1, model_index: 0 }
//!   ├─ ItemSucceeded { position: 1, filename: "SJ12-A-1.jpg" }
//!   ├─ ItemStarted { position: 2, model_index: 1 }
//!   ├─ ItemFailed { position: 2, message: "File 2: ..." }
//!   └─ ItemSkipped { position: 3 }        (only after cancellation)
//! BatchCompleted { succeeded: 1, failed: 1, skipped: 1 }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use drape::event::{BatchEvent, BatchEventHandler};
//! use async_trait::async_trait;
//!
//! struct Progress;
//!
//! #[async_trait]
//! impl BatchEventHandler for Progress {
//!     async fn on_batch_event(&self, event: &BatchEvent) {
//!         if let BatchEvent::ItemStarted { position, total, .. } = event {
//!             println!("Processing {} of {}...", position, total);
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

/// Events emitted by [`Studio::run_batch`](crate::orchestrator::Studio::run_batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Preconditions passed and the loop is about to start.
    BatchStarted {
        /// Number of garments in the batch.
        total: usize,
        /// Number of model photos available for pairing.
        model_count: usize,
    },

    /// A garment is about to be sent.
    ItemStarted {
        /// 1-based position of the garment in the batch.
        position: usize,
        /// Batch size.
        total: usize,
        /// Index of the model photo paired with this garment.
        model_index: usize,
        /// Id of the garment entry.
        garment_id: String,
    },

    /// A result landed in the gallery.
    ItemSucceeded {
        /// 1-based position.
        position: usize,
        /// Derived result filename.
        filename: String,
        /// URL of the generated image.
        result_url: String,
    },

    /// The item failed; the batch carries on.
    ItemFailed {
        /// 1-based position.
        position: usize,
        /// `"File {position}: {reason}"`.
        message: String,
    },

    /// The batch was cancelled before this item was attempted.
    ItemSkipped {
        /// 1-based position.
        position: usize,
    },

    /// The loop finished and the session is idle again.
    BatchCompleted {
        /// Items that produced a result.
        succeeded: usize,
        /// Items that failed.
        failed: usize,
        /// Items never attempted.
        skipped: usize,
    },
}

/// Receives [`BatchEvent`]s.
///
/// The `Send + Sync` bound lets one handler be shared as `Arc<dyn BatchEventHandler>`
/// between a session and whatever renders progress.
#[async_trait]
pub trait BatchEventHandler: Send + Sync {
    /// Called for every batch event, in order. Default: no-op.
    async fn on_batch_event(&self, _event: &BatchEvent) {}
}
