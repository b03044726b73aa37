//! Per-layer render cache

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use grib_core::{LayerId, OverlayRenderer, TimelineContext};
use parking_lot::RwLock;
use tracing::trace;

/// Geometry built for one layer at one timeline step
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLayer {
    pub step: usize,
    pub generation: u64,
    pub primitives: usize,
}

/// Cache of drawn layers, invalidated by the core
///
/// Each layer carries a generation counter bumped on invalidation, so a
/// renderer that started building before the bump can detect a stale result
/// with [`RenderCache::store`].
pub struct RenderCache {
    layers: Arc<RwLock<AHashMap<LayerId, CachedLayer>>>,
    generations: Arc<RwLock<AHashMap<LayerId, u64>>>,
    refreshes: AtomicU64,
    last_timeline: RwLock<Option<TimelineContext>>,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self {
            layers: Arc::new(RwLock::new(AHashMap::new())),
            generations: Arc::new(RwLock::new(AHashMap::new())),
            refreshes: AtomicU64::new(0),
            last_timeline: RwLock::new(None),
        }
    }

    pub fn generation(&self, layer: LayerId) -> u64 {
        self.generations.read().get(&layer).copied().unwrap_or(0)
    }

    pub fn get(&self, layer: LayerId) -> Option<CachedLayer> {
        self.layers.read().get(&layer).cloned()
    }

    /// Store freshly built geometry. Refused when the layer was invalidated
    /// after `generation` was read.
    pub fn store(&self, layer: LayerId, step: usize, generation: u64, primitives: usize) -> bool {
        if generation != self.generation(layer) {
            trace!(%layer, generation, "stale geometry dropped");
            return false;
        }
        self.layers.write().insert(
            layer,
            CachedLayer {
                step,
                generation,
                primitives,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.layers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn last_timeline(&self) -> Option<TimelineContext> {
        *self.last_timeline.read()
    }
}

impl OverlayRenderer for RenderCache {
    fn invalidate_layer(&self, layer: LayerId) {
        self.layers.write().remove(&layer);
        *self.generations.write().entry(layer).or_insert(0) += 1;
    }

    fn invalidate_all(&self) {
        self.layers.write().clear();
        let mut generations = self.generations.write();
        for layer in LayerId::ALL {
            *generations.entry(layer).or_insert(0) += 1;
        }
    }

    fn request_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    fn timeline_changed(&self, context: &TimelineContext) {
        // Geometry is per step; everything cached is for the old one
        self.layers.write().clear();
        *self.last_timeline.write() = Some(*context);
        self.request_refresh();
    }
}
