//! Preview references for images held by a session.
//!
//! Every model or garment image owns exactly one [`PreviewHandle`]. The handle is acquired
//! when the image is added and released when it is dropped, so removing a single image,
//! clearing a whole collection and dropping the session all release their previews without
//! any explicit bookkeeping.
//!
//! ```
//! use drape::preview::PreviewRegistry;
//!
//! let registry = PreviewRegistry::new();
//! let handle = registry.acquire();
//! assert!(registry.is_live(handle.reference()));
//! drop(handle);
//! assert_eq!(registry.live_count(), 0);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Issues and tracks preview references.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<String>>>,
}

impl PreviewRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a fresh preview reference.
    pub fn acquire(&self) -> PreviewHandle {
        let reference = format!("preview://{}", Uuid::new_v4());
        self.lock().insert(reference.clone());
        PreviewHandle {
            reference,
            registry: self.clone(),
        }
    }

    /// Number of references currently held.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether `reference` is still held by some image.
    pub fn is_live(&self, reference: &str) -> bool {
        self.lock().contains(reference)
    }

    fn release(&self, reference: &str) {
        if !self.lock().remove(reference) {
            log::warn!(
                "drape::preview::PreviewRegistry::release(...): {} was not live",
                reference
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

/// A held preview reference. Released on drop.
pub struct PreviewHandle {
    reference: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    /// The opaque reference string (`preview://<uuid>`).
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(&self.reference);
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.reference).finish()
    }
}
